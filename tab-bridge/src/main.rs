//! `tab-bridge`, a native messaging host which lets launchers list and switch browser tabs.
//!

pub mod cli;
use cli::init;
use std::path::PathBuf;
use tab_bridge_api::log::{parse_level, set_level};
use tab_bridge_daemon::{daemon_main, DaemonOptions};

pub fn main() -> anyhow::Result<()> {
    let args = init();

    if let Some(level) = args.value_of("LOG").and_then(parse_level) {
        set_level(level);
    }

    let options = DaemonOptions {
        runtime_dir: args.value_of("RUNTIME-DIR").map(PathBuf::from),
        origin: args
            .values_of("ORIGIN")
            .map(|values| values.map(str::to_string).collect())
            .unwrap_or_default(),
    };

    daemon_main(options)
}
