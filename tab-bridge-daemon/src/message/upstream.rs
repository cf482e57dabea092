use crate::client::UpstreamError;
use postage::oneshot;
use serde_json::Value;
use std::fmt;
use tab_bridge_api::upstream::UpstreamRequest;

/// A request for the upstream worker, and the slot its response is delivered to
pub struct UpstreamCall {
    pub request: UpstreamRequest,
    pub reply: oneshot::Sender<Result<Value, UpstreamError>>,
}

impl fmt::Debug for UpstreamCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamCall")
            .field("request", &self.request)
            .finish()
    }
}

/// The extension announced that its tabs changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabsChanged {}
