use serde::{Deserialize, Serialize};
use std::{fmt, slice, sync::Arc};

/// Identifies a browser tab.  Assigned by the browser, and treated as opaque.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A browser tab, as reported by the extension.
///
/// The extension omits `title` for tabs that are still loading, so both strings default to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub host: String,
}

/// The last known tab list, in browser order.
///
/// A refresh replaces the whole snapshot.  Clones share the same list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSnapshot {
    tabs: Arc<Vec<Tab>>,
}

impl TabSnapshot {
    pub fn new(tabs: Vec<Tab>) -> Self {
        Self {
            tabs: Arc::new(tabs),
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        self.tabs.as_slice()
    }

    pub fn iter(&self) -> slice::Iter<'_, Tab> {
        self.tabs.iter()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

impl From<Vec<Tab>> for TabSnapshot {
    fn from(tabs: Vec<Tab>) -> Self {
        Self::new(tabs)
    }
}
