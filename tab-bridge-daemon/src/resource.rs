use lifeline::impl_storage_take;
use std::fmt;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::UnixListener,
};

/// The native messaging channel.  Stdin and stdout in production.
pub struct UpstreamResource {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl UpstreamResource {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl fmt::Debug for UpstreamResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResource").finish()
    }
}

impl_storage_take!(UpstreamResource);

#[derive(Debug)]
pub struct ListenerResource(pub UnixListener);

impl_storage_take!(ListenerResource);
