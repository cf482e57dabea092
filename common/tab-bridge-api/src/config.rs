use crate::retry::RetryPolicy;
use anyhow::Result;
use lifeline::impl_storage_clone;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_RUNTIME_DIR: &str = "/tmp";
pub const DEFAULT_LOG_FILE: &str = "/tmp/rofi-chrome-tab.log";

/// If this file exists, the bridge runs in debug mode
pub const DEBUG_MARKER_FILE: &str = "/tmp/.rofi-chrome-tab.debug";

/// Delay between a tab change notification and the refresh it triggers
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// User-facing config, loaded from the optional config.yml
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub runtime_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub debug: Option<bool>,
}

/// Config created for each bridge process
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub pid: u32,
    pub socket_path: PathBuf,
    pub log_file: PathBuf,
    pub debug: bool,
    pub settle_delay: Duration,
    pub retry: RetryPolicy,
}

impl_storage_clone!(BridgeConfig);

impl BridgeConfig {
    /// Loads the config file, checks for the debug marker, and resolves paths for this process.
    pub fn load(runtime_dir: Option<PathBuf>) -> Result<Self> {
        let config = load_config()?;
        let debug_marker = Path::new(DEBUG_MARKER_FILE).exists();

        Ok(Self::resolve(
            std::process::id(),
            &config,
            runtime_dir,
            debug_marker,
        ))
    }

    pub fn resolve(
        pid: u32,
        config: &Config,
        runtime_dir: Option<PathBuf>,
        debug_marker: bool,
    ) -> Self {
        let debug = debug_marker || config.debug.unwrap_or(false);

        let runtime_dir = runtime_dir
            .or_else(|| config.runtime_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNTIME_DIR));

        let log_file = config
            .log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        Self {
            pid,
            socket_path: socket_path(runtime_dir.as_path(), pid, debug),
            log_file,
            debug,
            settle_delay: SETTLE_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

/// The launcher finds the bridge by pid.  In debug mode the path is fixed.
pub fn socket_path(runtime_dir: &Path, pid: u32, debug: bool) -> PathBuf {
    let name = if debug {
        "native-app.sock".to_string()
    } else {
        format!("native-app.{}.sock", pid)
    };

    runtime_dir.join(name)
}

pub fn config_path() -> Result<PathBuf> {
    let mut dir =
        dirs::config_dir().ok_or_else(|| anyhow::Error::msg("config_dir not found"))?;

    dir.push("tab-bridge");
    dir.push("config.yml");

    Ok(dir)
}

pub fn load_config() -> Result<Config> {
    match config_path() {
        Ok(path) => load_config_from(path.as_path()),
        Err(_) => Ok(Config::default()),
    }
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.is_file() {
        log::debug!("File {:?} does not exist", path);
        return Ok(Config::default());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config = serde_yaml::from_reader(reader)?;

    Ok(config)
}
