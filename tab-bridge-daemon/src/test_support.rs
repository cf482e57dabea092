use crate::{bus::MainBus, resource::UpstreamResource};
use lifeline::dyn_bus::DynBus;
use serde_json::Value;
use std::{path::Path, time::Duration};
use tab_bridge_api::{
    config::BridgeConfig,
    native::{decode, encode},
    retry::RetryPolicy,
};
use tokio::io::{split, AsyncWrite, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

pub const TEST_PID: u32 = 4242;

pub fn test_config(runtime_dir: &Path) -> BridgeConfig {
    BridgeConfig {
        pid: TEST_PID,
        socket_path: runtime_dir.join(format!("native-app.{}.sock", TEST_PID)),
        log_file: runtime_dir.join("bridge.log"),
        debug: false,
        settle_delay: Duration::from_millis(20),
        retry: RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(1),
        },
    }
}

/// The extension side of a native messaging channel
pub struct FakeBrowser {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeBrowser {
    pub async fn recv(&mut self) -> Value {
        decode(&mut self.reader).await.expect("browser recv failed")
    }

    pub async fn send(&mut self, message: Value) {
        encode(&mut self.writer, &message)
            .await
            .expect("browser send failed");
    }

    /// Sends a frame with an arbitrary body
    pub async fn send_raw(&mut self, body: &[u8]) {
        self.writer
            .write_all(&(body.len() as u32).to_le_bytes())
            .await
            .expect("browser send failed");
        self.writer.write_all(body).await.expect("browser send failed");
        self.writer.flush().await.expect("browser send failed");
    }

    /// Sends the zero-length frame that closes the channel
    pub async fn close(&mut self) {
        self.writer
            .write_all(&[0, 0, 0, 0])
            .await
            .expect("browser close failed");
    }
}

pub fn browser_pair() -> (UpstreamResource, FakeBrowser) {
    let (bridge, browser) = tokio::io::duplex(64 * 1024);

    let (bridge_reader, bridge_writer) = split(bridge);
    let (reader, writer) = split(browser);

    (
        UpstreamResource::new(bridge_reader, bridge_writer),
        FakeBrowser { reader, writer },
    )
}

/// A bus carrying the test config and one end of a native messaging channel
pub fn upstream_bus() -> (MainBus, FakeBrowser) {
    let bus = MainBus::default();
    let (upstream, browser) = browser_pair();

    bus.store_resource(test_config(std::env::temp_dir().as_path()));
    bus.store_resource(upstream);

    (bus, browser)
}

/// A bus whose upstream writes go to the given writer.  The browser can still send frames.
pub fn upstream_bus_with_writer<W>(writer: W) -> (MainBus, FakeBrowser)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let bus = MainBus::default();
    let (bridge, browser) = tokio::io::duplex(64 * 1024);

    let (bridge_reader, _bridge_writer) = split(bridge);
    let (reader, writer_half) = split(browser);

    bus.store_resource(test_config(std::env::temp_dir().as_path()));
    bus.store_resource(UpstreamResource::new(bridge_reader, writer));

    (
        bus,
        FakeBrowser {
            reader,
            writer: writer_half,
        },
    )
}
