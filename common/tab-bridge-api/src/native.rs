//! Native messaging framing.
//!
//! Each message is a 4-byte little-endian length, followed by that many bytes of UTF-8 JSON.
//! A zero length is the extension host's signal that the channel has closed.
use crate::log::preview;
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::{convert::TryFrom, io, string::FromUtf8Error};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Browsers never send a message larger than 64 MiB to a native host
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("the native messaging channel is closed")]
    Closed,

    #[error("native messaging io failed: {0}")]
    Io(#[from] io::Error),

    #[error("frame body is not utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("frame body is not json ({preview}): {source}")]
    Json {
        preview: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("message could not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("frame length {0} exceeds the limit")]
    TooLarge(usize),
}

impl FrameError {
    pub fn is_closed(&self) -> bool {
        matches!(self, FrameError::Closed)
    }

    /// The frame was consumed, but its body could not be decoded.  The stream is still aligned.
    pub fn is_malformed(&self) -> bool {
        matches!(self, FrameError::Utf8(_) | FrameError::Json { .. })
    }
}

/// Reads one message from the stream.
///
/// Returns FrameError::Closed for a zero-length frame, or if the stream ends before a length prefix.
pub async fn decode<R>(reader: &mut R) -> Result<Value, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(err) => return Err(err.into()),
    }

    let length = u32::from_le_bytes(prefix) as usize;
    if length == 0 {
        return Err(FrameError::Closed);
    }

    if length > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(length));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(body.as_mut_slice()).await?;

    let message = String::from_utf8(body)?;
    debug!("recv_message: {}", preview(&message));

    serde_json::from_str(&message).map_err(|source| FrameError::Json {
        preview: preview(&message),
        source,
    })
}

/// Serializes one message as compact JSON, with its length prefix.
pub fn frame<T>(message: &T) -> Result<Vec<u8>, FrameError>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message).map_err(FrameError::Serialize)?;
    let length = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge(body.len()))?;

    debug!("send_message: {}", preview(&String::from_utf8_lossy(&body)));

    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(body.as_slice());

    Ok(frame)
}

/// Writes one message to the stream as compact JSON, and flushes it.
pub async fn encode<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize + ?Sized,
{
    let frame = frame(message)?;

    writer.write_all(frame.as_slice()).await?;
    writer.flush().await?;

    Ok(())
}
