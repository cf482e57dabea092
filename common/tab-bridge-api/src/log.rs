//! A global, configurable level filter, and payload previews for log lines.
//!
//! The main executable sets the level if the --log <level> option is provided.
//! get_level() returns None unless set_level has been called.
use std::sync::atomic::{AtomicU8, Ordering};

use log::LevelFilter;

/// Number of payload characters included in a log preview
pub const PREVIEW_LENGTH: usize = 30;

// unset
static LOG_LEVEL: AtomicU8 = AtomicU8::new(0);

pub fn set_level(level: LevelFilter) {
    let byte_repr = discriminant_of(level);
    LOG_LEVEL.store(byte_repr, Ordering::SeqCst);
}

pub fn get_level() -> Option<LevelFilter> {
    level_of(LOG_LEVEL.load(Ordering::SeqCst))
}

/// Parses one of the `--log` option values
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Truncates a payload to PREVIEW_LENGTH characters, marking the cut with `...`
pub fn preview(message: &str) -> String {
    match message.char_indices().nth(PREVIEW_LENGTH) {
        Some((index, _)) => format!("{}...", &message[..index]),
        None => message.to_string(),
    }
}

// LevelFilter has a from_usize method, but it's private
// we have to redo the cases here, and support None as 0
fn discriminant_of(filter: LevelFilter) -> u8 {
    match filter {
        LevelFilter::Trace => 1,
        LevelFilter::Debug => 2,
        LevelFilter::Info => 3,
        LevelFilter::Warn => 4,
        LevelFilter::Error => 5,
        LevelFilter::Off => 6,
    }
}

fn level_of(filter: u8) -> Option<LevelFilter> {
    match filter {
        0 => None,
        1 => Some(LevelFilter::Trace),
        2 => Some(LevelFilter::Debug),
        3 => Some(LevelFilter::Info),
        4 => Some(LevelFilter::Warn),
        5 => Some(LevelFilter::Error),
        6 => Some(LevelFilter::Off),
        _ => unreachable!("unreachable level discriminant"),
    }
}
