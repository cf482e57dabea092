//! Shared API, exported to `tab-bridge` and `tab-bridge-daemon`
//!
//! Both wire protocols are described in this crate: the native messaging framing spoken with
//! the browser extension over stdio, and the line protocol spoken with the launcher over the
//! unix socket.

pub mod command;
pub mod config;
pub mod launch;
pub mod log;
pub mod native;
pub mod retry;
pub mod tab;
pub mod upstream;
