//! The bridge daemon.
//!
//! Relays commands from launcher connections on a unix socket to the browser extension, over the
//! native messaging channel on stdin/stdout.  Keeps a cache of the browser's tabs, refreshed
//! whenever the extension announces a change.
use crate::prelude::*;

use lifeline::dyn_bus::DynBus;
use log::LevelFilter;
use message::main::MainShutdown;
use resource::{ListenerResource, UpstreamResource};
use service::main::MainService;
use simplelog::{
    ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use socketfile::SocketFile;
use std::{fs::OpenOptions, future::ready, path::PathBuf, time::Duration};
use tab_bridge_api::{
    config::BridgeConfig, launch::wait_for_shutdown, log::get_level, retry::with_retry,
};

mod bus;
mod client;
mod message;
mod prelude;
mod resource;
mod service;
mod socketfile;
mod state;

#[cfg(test)]
mod test_support;

/// Launch options, parsed from the command line
#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Overrides the directory the socket is created in
    pub runtime_dir: Option<PathBuf>,
    /// Arguments passed by the browser: the extension origin, and on some platforms the parent window
    pub origin: Vec<String>,
}

pub fn daemon_main(options: DaemonOptions) -> anyhow::Result<()> {
    let config = BridgeConfig::load(options.runtime_dir.clone())?;
    init(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;

    let result = runtime.block_on(async { main_async(config, options).await });

    // stdin is read on a blocking thread, which only exits when the browser closes the pipe
    runtime.shutdown_timeout(Duration::from_millis(25));

    result?;

    Ok(())
}

fn init(config: &BridgeConfig) -> anyhow::Result<()> {
    let log_config = simplelog::ConfigBuilder::new()
        .set_time_format_str("%H:%M:%S%.3f BRG")
        .build();

    let default_level = if config.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let level = get_level().unwrap_or(default_level);

    // stdout carries the native messaging channel.  logs go to stderr, and the log file.
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Never,
    )];

    if config.debug {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_file.as_path())?;

        loggers.push(WriteLogger::new(level, log_config, log_file));
    }

    CombinedLogger::init(loggers)?;
    log_panics::init();

    Ok(())
}

/// Binds the socket, and creates a bus carrying the config, the socket, and the upstream channel
pub(crate) async fn new_bus(
    config: BridgeConfig,
    upstream: UpstreamResource,
) -> anyhow::Result<(MainBus, SocketFile)> {
    let path = config.socket_path.clone();
    let (socket_file, listener) = with_retry(&config.retry, "bind socket", || {
        ready(SocketFile::bind(path.as_path()))
    })
    .await?;

    let bus = MainBus::default();
    bus.store_resource(config);
    bus.store_resource(upstream);
    bus.store_resource(ListenerResource(listener));

    Ok((bus, socket_file))
}

async fn main_async(config: BridgeConfig, options: DaemonOptions) -> anyhow::Result<()> {
    info!("Bridge started.");
    info!("Bridge pid: {}", config.pid);
    if config.debug {
        info!("Debug mode enabled.  Logging to {}", config.log_file.display());
    }

    if !options.origin.is_empty() {
        debug!("Launched by: {}", options.origin.join(" "));
    }

    let (bus, socket_file) = new_bus(config, UpstreamResource::stdio()).await?;
    info!("Listening on socket: {}", socket_file.path().display());

    let _service = MainService::spawn(&bus)?;
    let shutdown = bus.rx::<MainShutdown>()?;

    wait_for_shutdown(shutdown).await;

    info!("Bridge shutdown.");
    drop(socket_file);

    Ok(())
}
