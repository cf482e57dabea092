//! Messages exchanged with the browser extension over the native messaging channel.
use crate::tab::{Tab, TabId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request sent to the extension.  Serialized as `{"command": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum UpstreamRequest {
    Count,
    List,
    Select {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
}

impl UpstreamRequest {
    pub fn name(&self) -> &'static str {
        match self {
            UpstreamRequest::Count => "count",
            UpstreamRequest::List => "list",
            UpstreamRequest::Select { .. } => "select",
        }
    }

    /// Returns true if the frame can complete this request.
    ///
    /// The extension never acknowledges `select` directly.  Activating the tab makes it
    /// announce the change, so any frame at all completes a pending select.
    pub fn accepts(&self, frame: &Value) -> bool {
        match self {
            UpstreamRequest::Select { .. } => true,
            UpstreamRequest::Count | UpstreamRequest::List => !is_notification(frame),
        }
    }
}

/// An unsolicited message from the extension
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notification {
    /// The active tab changed.  The extension includes its current tab list.
    ///
    /// The bridge only logs these tabs.  The cache is filled by the `list` refresh that follows.
    Updated {
        #[serde(default)]
        tabs: Vec<Tab>,
    },
}

/// Notifications are objects tagged with a `type` field.  Responses never are.
pub fn is_notification(frame: &Value) -> bool {
    frame
        .as_object()
        .map(|object| object.contains_key("type"))
        .unwrap_or(false)
}
