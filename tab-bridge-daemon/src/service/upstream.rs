use crate::{
    client::UpstreamError,
    message::{
        main::MainShutdown,
        upstream::{TabsChanged, UpstreamCall},
    },
    prelude::*,
    resource::UpstreamResource,
};
use postage::mpsc;
use serde::Deserialize;
use serde_json::Value;
use std::{io, sync::Arc};
use tab_bridge_api::{
    config::BridgeConfig,
    log::preview,
    native::{decode, frame, FrameError},
    retry::{with_retry, RetryPolicy},
    upstream::{is_notification, Notification},
};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

/// Owns the native messaging channel.
///
/// A reader task consumes every inbound frame.  The dispatcher writes one request at a time, and
/// waits for the frame that completes it before taking the next call.  Frames that arrive while
/// idle, and notifications at any time, are announced as TabsChanged.
pub struct UpstreamService {
    _read: Lifeline,
    _dispatch: Lifeline,
}

impl Service for UpstreamService {
    type Bus = MainBus;
    type Lifeline = anyhow::Result<Self>;

    fn spawn(bus: &Self::Bus) -> Self::Lifeline {
        let UpstreamResource { reader, writer } = bus.resource::<UpstreamResource>()?;
        let config = bus.resource::<BridgeConfig>()?;

        let (tx_frame, rx_frame) = mpsc::channel(16);

        let _read = Self::try_task("read", Self::read(reader, tx_frame));

        let _dispatch = {
            let dispatcher = Dispatcher {
                rx_frame,
                writer: UpstreamWriter::new(writer),
                retry: config.retry.clone(),
                tx_changed: bus.tx::<TabsChanged>()?,
            };

            let rx_call = bus.rx::<UpstreamCall>()?;
            let tx_shutdown = bus.tx::<MainShutdown>()?;
            Self::try_task("dispatch", dispatcher.run(rx_call, tx_shutdown))
        };

        Ok(Self { _read, _dispatch })
    }
}

impl UpstreamService {
    async fn read(
        mut reader: Box<dyn AsyncRead + Send + Unpin>,
        mut tx: impl Sink<Item = UpstreamFrame> + Unpin,
    ) -> anyhow::Result<()> {
        loop {
            let frame = match decode(&mut reader).await {
                Ok(value) => UpstreamFrame::Message(value),
                Err(FrameError::Json { preview, source }) => {
                    warn!("recv_message: invalid json ({}): {}", preview, source);
                    UpstreamFrame::Malformed(preview)
                }
                Err(err @ FrameError::Utf8(_)) => {
                    warn!("recv_message: {}", err);
                    UpstreamFrame::Malformed(err.to_string())
                }
                Err(FrameError::Closed) => {
                    info!("native messaging channel closed");
                    UpstreamFrame::Closed
                }
                Err(err) => {
                    error!("recv_message failed: {}", err);
                    UpstreamFrame::Closed
                }
            };

            let closed = frame == UpstreamFrame::Closed;
            if tx.send(frame).await.is_err() || closed {
                break;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum UpstreamFrame {
    Message(Value),
    Malformed(String),
    Closed,
}

/// Shared handle to the outbound half, so a retried write can own its own future
#[derive(Clone)]
struct UpstreamWriter {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

/// A frame write failure.  Only an unsent frame can be retried without desynchronizing the peer.
#[derive(Error, Debug)]
enum WriteError {
    #[error("{0}")]
    Unsent(#[source] io::Error),

    #[error("{source} after {written} of {length} bytes")]
    Partial {
        written: usize,
        length: usize,
        #[source]
        source: io::Error,
    },
}

impl UpstreamWriter {
    fn new(writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    async fn send(self, frame: Arc<Vec<u8>>) -> Result<(), WriteError> {
        let mut writer = self.writer.lock().await;
        let mut written = 0;

        while written < frame.len() {
            let result = match writer.write(&frame[written..]).await {
                Ok(0) => Err(io::Error::from(io::ErrorKind::WriteZero)),
                result => result,
            };

            match result {
                Ok(n) => written += n,
                Err(source) if written == 0 => return Err(WriteError::Unsent(source)),
                Err(source) => {
                    return Err(WriteError::Partial {
                        written,
                        length: frame.len(),
                        source,
                    })
                }
            }
        }

        writer.flush().await.map_err(|source| WriteError::Partial {
            written,
            length: frame.len(),
            source,
        })
    }
}

struct Dispatcher<TxChanged> {
    rx_frame: mpsc::Receiver<UpstreamFrame>,
    writer: UpstreamWriter,
    retry: RetryPolicy,
    tx_changed: TxChanged,
}

enum Exchange {
    Complete,
    Closed,
}

impl<TxChanged> Dispatcher<TxChanged>
where
    TxChanged: Sink<Item = TabsChanged> + Unpin,
{
    async fn run(
        mut self,
        mut rx_call: impl Stream<Item = UpstreamCall> + Unpin,
        mut tx_shutdown: impl Sink<Item = MainShutdown> + Unpin,
    ) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                frame = self.rx_frame.recv() => match frame {
                    Some(UpstreamFrame::Message(value)) => self.notify(&value),
                    Some(UpstreamFrame::Malformed(preview)) => {
                        warn!("dropping malformed frame while idle: {}", preview);
                    }
                    Some(UpstreamFrame::Closed) | None => break,
                },
                call = rx_call.recv() => match call {
                    Some(call) => {
                        if let Exchange::Closed = self.exchange(call).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        info!("upstream worker stopped.  shutting down");
        tx_shutdown.send(MainShutdown {}).await.ok();

        Ok(())
    }

    async fn exchange(&mut self, call: UpstreamCall) -> Exchange {
        let UpstreamCall { request, mut reply } = call;
        let operation = request.name();

        let frame = match frame(&request) {
            Ok(frame) => Arc::new(frame),
            Err(err) => {
                error!("{} could not be encoded: {}", operation, err);
                let err = UpstreamError::Transport(err.to_string());
                reply.send(Err(err)).await.ok();
                return Exchange::Complete;
            }
        };

        // a partially written frame can't be retried, so it ends the retry loop as a success
        let writer = &self.writer;
        let sent = with_retry(&self.retry, operation, || {
            let send = writer.clone().send(frame.clone());
            async move {
                match send.await {
                    Err(WriteError::Unsent(err)) => Err(err),
                    result => Ok(result),
                }
            }
        })
        .await;

        let sent = match sent {
            Ok(result) => result,
            Err(err) => Err(WriteError::Unsent(err)),
        };

        if let Err(err) = sent {
            error!("{} request could not be written: {}", operation, err);
            reply
                .send(Err(UpstreamError::Transport(err.to_string())))
                .await
                .ok();
            return Exchange::Closed;
        }

        loop {
            let (result, exchange) = match self.rx_frame.recv().await {
                Some(UpstreamFrame::Message(value)) => {
                    let accepted = request.accepts(&value);
                    if is_notification(&value) {
                        self.notify(&value);
                    }

                    if !accepted {
                        continue;
                    }

                    (Ok(value), Exchange::Complete)
                }
                Some(UpstreamFrame::Malformed(preview)) => {
                    error!("{} failed: malformed response: {}", operation, preview);
                    let err = UpstreamError::Malformed {
                        operation: operation.to_string(),
                        preview,
                    };

                    (Err(err), Exchange::Complete)
                }
                Some(UpstreamFrame::Closed) | None => (Err(UpstreamError::Closed), Exchange::Closed),
            };

            if reply.send(result).await.is_err() {
                debug!("{} caller went away before the response", operation);
            }

            return exchange;
        }
    }

    fn notify(&mut self, frame: &Value) {
        match Notification::deserialize(frame) {
            Ok(Notification::Updated { tabs }) => debug!("tabs updated: {} tabs", tabs.len()),
            Err(_) => debug!("unrecognized notification: {}", preview(&frame.to_string())),
        }

        // a refresh is already pending if the channel is full
        self.tx_changed.try_send(TabsChanged {}).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::UpstreamService;
    use crate::{
        client::{UpstreamClient, UpstreamError},
        message::{
            main::MainShutdown,
            upstream::{TabsChanged, UpstreamCall},
        },
        prelude::*,
        test_support::{upstream_bus, upstream_bus_with_writer},
    };
    use lifeline::{assert_completes, assert_times_out};
    use serde_json::json;
    use std::{io, time::Duration};
    use tab_bridge_api::{
        native::frame,
        tab::{Tab, TabId},
    };
    use tokio::time;
    use tokio_test::io::Builder;

    fn broken_pipe() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")
    }

    fn count_frame() -> Vec<u8> {
        frame(&json!({"command": "count"})).unwrap()
    }

    #[tokio::test]
    async fn count_round_trip() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let count = tokio::spawn(async move { client.count().await });

        assert_completes!(async {
            assert_eq!(json!({"command": "count"}), browser.recv().await);
        });

        browser.send(json!(3)).await;

        assert_eq!(Ok(3), count.await?);

        Ok(())
    }

    #[tokio::test]
    async fn list_round_trip() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let list = tokio::spawn(async move { client.list().await });

        assert_eq!(json!({"command": "list"}), browser.recv().await);
        browser
            .send(json!([{"id": 1, "title": "A", "host": "a.com"}]))
            .await;

        let snapshot = list.await??;
        assert_eq!(
            vec![Tab {
                id: TabId(1),
                title: "A".into(),
                host: "a.com".into()
            }],
            snapshot.tabs()
        );

        Ok(())
    }

    #[tokio::test]
    async fn select_is_acked_by_notification() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let mut rx_changed = bus.rx::<TabsChanged>()?;
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let select = tokio::spawn(async move { client.select(TabId(42)).await });

        assert_eq!(
            json!({"command": "select", "tabId": 42}),
            browser.recv().await
        );
        browser.send(json!({"type": "updated", "tabs": []})).await;

        assert_eq!(Ok(()), select.await?);

        assert_completes!(async {
            assert_eq!(Some(TabsChanged {}), rx_changed.recv().await);
        });

        Ok(())
    }

    #[tokio::test]
    async fn notification_during_count() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let mut rx_changed = bus.rx::<TabsChanged>()?;
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let count = tokio::spawn(async move { client.count().await });

        browser.recv().await;
        browser.send(json!({"type": "updated", "tabs": []})).await;
        browser.send(json!(5)).await;

        assert_eq!(Ok(5), count.await?);

        assert_completes!(async {
            assert_eq!(Some(TabsChanged {}), rx_changed.recv().await);
        });

        Ok(())
    }

    #[tokio::test]
    async fn idle_frame_is_notification() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let mut rx_changed = bus.rx::<TabsChanged>()?;
        let _service = UpstreamService::spawn(&bus)?;

        browser.send(json!({"type": "updated", "tabs": []})).await;

        assert_completes!(async {
            assert_eq!(Some(TabsChanged {}), rx_changed.recv().await);
        });

        Ok(())
    }

    #[tokio::test]
    async fn calls_are_serialized() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.count().await })
        };

        assert_eq!(json!({"command": "count"}), browser.recv().await);

        let second = tokio::spawn(async move { client.count().await });

        // the second request is not written until the first is answered
        assert_times_out!(async {
            browser.recv().await;
        });

        browser.send(json!(1)).await;
        assert_eq!(Ok(1), first.await?);

        assert_completes!(async {
            assert_eq!(json!({"command": "count"}), browser.recv().await);
        });

        browser.send(json!(2)).await;
        assert_eq!(Ok(2), second.await?);

        Ok(())
    }

    #[tokio::test]
    async fn malformed_response_fails_request() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let count = {
            let client = client.clone();
            tokio::spawn(async move { client.count().await })
        };

        browser.recv().await;
        browser.send_raw(b"not json").await;

        assert_eq!(
            Err(UpstreamError::Malformed {
                operation: "count".into(),
                preview: "not json".into()
            }),
            count.await?
        );

        // the channel stays usable
        let count = tokio::spawn(async move { client.count().await });
        browser.recv().await;
        browser.send(json!(4)).await;
        assert_eq!(Ok(4), count.await?);

        Ok(())
    }

    #[tokio::test]
    async fn list_shape_error() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let list = tokio::spawn(async move { client.list().await });

        browser.recv().await;
        browser.send(json!(7)).await;

        assert_eq!(
            Err(UpstreamError::Malformed {
                operation: "list".into(),
                preview: "7".into()
            }),
            list.await?
        );

        Ok(())
    }

    #[tokio::test]
    async fn close_shuts_down() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let mut rx_shutdown = bus.rx::<MainShutdown>()?;
        let _service = UpstreamService::spawn(&bus)?;

        browser.close().await;

        assert_completes!(async {
            assert_eq!(Some(MainShutdown {}), rx_shutdown.recv().await);
        });

        Ok(())
    }

    #[tokio::test]
    async fn close_fails_pending_request() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let mut rx_shutdown = bus.rx::<MainShutdown>()?;
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let count = tokio::spawn(async move { client.count().await });

        browser.recv().await;
        browser.close().await;

        assert_eq!(Err(UpstreamError::Closed), count.await?);

        assert_completes!(async {
            assert_eq!(Some(MainShutdown {}), rx_shutdown.recv().await);
        });

        Ok(())
    }

    #[tokio::test]
    async fn count_and_select_are_serialized() -> anyhow::Result<()> {
        let (bus, mut browser) = upstream_bus();
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let count = {
            let client = client.clone();
            tokio::spawn(async move { client.count().await })
        };

        assert_eq!(json!({"command": "count"}), browser.recv().await);

        let select = tokio::spawn(async move { client.select(TabId(7)).await });

        // select waits for the count response before it is written
        assert_times_out!(async {
            browser.recv().await;
        });

        browser.send(json!(2)).await;
        assert_eq!(Ok(2), count.await?);

        assert_completes!(async {
            assert_eq!(
                json!({"command": "select", "tabId": 7}),
                browser.recv().await
            );
        });

        browser.send(json!({"type": "updated", "tabs": []})).await;
        assert_eq!(Ok(()), select.await?);

        Ok(())
    }

    #[tokio::test]
    async fn unsent_write_is_retried() -> anyhow::Result<()> {
        let writer = Builder::new()
            .write_error(broken_pipe())
            .write_error(broken_pipe())
            .write(&count_frame())
            .build();

        let (bus, mut browser) = upstream_bus_with_writer(writer);
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let count = tokio::spawn(async move { client.count().await });

        // the third attempt writes the frame.  answer once it has
        time::sleep(Duration::from_millis(50)).await;
        browser.send(json!(3)).await;

        assert_eq!(Ok(3), count.await?);

        Ok(())
    }

    #[tokio::test]
    async fn exhausted_write_retries_shut_down() -> anyhow::Result<()> {
        let writer = Builder::new()
            .write_error(broken_pipe())
            .write_error(broken_pipe())
            .write_error(broken_pipe())
            .build();

        let (bus, _browser) = upstream_bus_with_writer(writer);
        let mut rx_shutdown = bus.rx::<MainShutdown>()?;
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let count = tokio::spawn(async move { client.count().await });

        assert!(matches!(count.await?, Err(UpstreamError::Transport(_))));

        assert_completes!(async {
            assert_eq!(Some(MainShutdown {}), rx_shutdown.recv().await);
        });

        Ok(())
    }

    #[tokio::test]
    async fn partial_write_is_not_retried() -> anyhow::Result<()> {
        let frame = count_frame();

        // the length prefix is written, and then the pipe breaks
        let writer = Builder::new()
            .write(&frame[..4])
            .write_error(broken_pipe())
            .build();

        let (bus, _browser) = upstream_bus_with_writer(writer);
        let mut rx_shutdown = bus.rx::<MainShutdown>()?;
        let _service = UpstreamService::spawn(&bus)?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);

        let count = tokio::spawn(async move { client.count().await });

        assert!(matches!(count.await?, Err(UpstreamError::Transport(_))));

        assert_completes!(async {
            assert_eq!(Some(MainShutdown {}), rx_shutdown.recv().await);
        });

        Ok(())
    }
}
