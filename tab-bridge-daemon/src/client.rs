use crate::message::upstream::UpstreamCall;
use postage::{mpsc, oneshot, sink::Sink, stream::Stream};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tab_bridge_api::{
    log::preview,
    tab::{Tab, TabId, TabSnapshot},
    upstream::UpstreamRequest,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("the browser closed the native messaging channel")]
    Closed,

    #[error("the upstream worker has stopped")]
    Disconnected,

    #[error("request could not be written: {0}")]
    Transport(String),

    #[error("malformed {operation} response: {preview}")]
    Malformed { operation: String, preview: String },
}

impl UpstreamError {
    /// True if no further upstream calls can succeed
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            UpstreamError::Closed | UpstreamError::Disconnected | UpstreamError::Transport(_)
        )
    }
}

/// Issues requests to the browser extension.
///
/// Calls are queued to the upstream worker, which performs one exchange at a time.
/// The client can be cloned freely, and shared across connections.
#[derive(Clone)]
pub struct UpstreamClient {
    tx: mpsc::Sender<UpstreamCall>,
}

impl UpstreamClient {
    pub fn new(tx: mpsc::Sender<UpstreamCall>) -> Self {
        Self { tx }
    }

    pub async fn count(&self) -> Result<i64, UpstreamError> {
        let response = self.call(UpstreamRequest::Count).await?;
        parse_response("count", response)
    }

    pub async fn list(&self) -> Result<TabSnapshot, UpstreamError> {
        let response = self.call(UpstreamRequest::List).await?;
        let tabs: Vec<Tab> = parse_response("list", response)?;
        Ok(tabs.into())
    }

    /// Activates the tab.  The extension's acknowledgement carries no information, and is discarded.
    pub async fn select(&self, tab_id: TabId) -> Result<(), UpstreamError> {
        self.call(UpstreamRequest::Select { tab_id }).await?;
        Ok(())
    }

    async fn call(&self, request: UpstreamRequest) -> Result<Value, UpstreamError> {
        let (reply, mut rx_reply) = oneshot::channel();
        let call = UpstreamCall { request, reply };

        let mut tx = self.tx.clone();
        tx.send(call)
            .await
            .map_err(|_| UpstreamError::Disconnected)?;

        match rx_reply.recv().await {
            Some(result) => result,
            None => Err(UpstreamError::Disconnected),
        }
    }
}

fn parse_response<T: DeserializeOwned>(operation: &str, response: Value) -> Result<T, UpstreamError> {
    serde_json::from_value(response.clone()).map_err(|err| {
        let preview = preview(&response.to_string());
        log::error!("{} response has the wrong shape ({}): {}", operation, preview, err);

        UpstreamError::Malformed {
            operation: operation.to_string(),
            preview,
        }
    })
}
