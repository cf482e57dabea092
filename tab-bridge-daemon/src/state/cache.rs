use postage::watch;
use tab_bridge_api::tab::TabSnapshot;

/// Read access to the last known tab list.
///
/// The refresh loop replaces the whole snapshot at once, so a reader sees either the old list or
/// the new one.  Reads never reach the browser.
#[derive(Clone)]
pub struct TabCache {
    rx: watch::Receiver<TabSnapshot>,
}

impl TabCache {
    pub fn new(rx: watch::Receiver<TabSnapshot>) -> Self {
        Self { rx }
    }

    pub fn snapshot(&self) -> TabSnapshot {
        self.rx.borrow().clone()
    }
}
