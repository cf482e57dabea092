use crate::{
    client::UpstreamClient,
    message::upstream::{TabsChanged, UpstreamCall},
    prelude::*,
};
use std::time::Duration;
use tab_bridge_api::{config::BridgeConfig, tab::TabSnapshot};
use tokio::time;

/// Refreshes the tab cache after the extension announces a change.
///
/// The browser is given a settle delay to finish the change.  Announcements that arrive during the
/// delay are folded into the same refresh.
pub struct TabEventService {
    _refresh: Lifeline,
}

impl Service for TabEventService {
    type Bus = MainBus;
    type Lifeline = anyhow::Result<Self>;

    fn spawn(bus: &Self::Bus) -> Self::Lifeline {
        let config = bus.resource::<BridgeConfig>()?;
        let rx = bus.rx::<TabsChanged>()?;
        let client = UpstreamClient::new(bus.tx::<UpstreamCall>()?);
        let tx = bus.tx::<TabSnapshot>()?;

        let _refresh = Self::try_task(
            "refresh",
            Self::refresh(config.settle_delay, rx, client, tx),
        );

        Ok(Self { _refresh })
    }
}

impl TabEventService {
    async fn refresh(
        settle_delay: Duration,
        mut rx: impl Stream<Item = TabsChanged> + Unpin,
        client: UpstreamClient,
        mut tx: impl Sink<Item = TabSnapshot> + Unpin,
    ) -> anyhow::Result<()> {
        while let Some(_changed) = rx.recv().await {
            time::sleep(settle_delay).await;

            let mut coalesced = 0usize;
            while rx.try_recv().is_ok() {
                coalesced += 1;
            }

            if coalesced > 0 {
                debug!("coalesced {} tab change notifications", coalesced);
            }

            match client.list().await {
                Ok(snapshot) => {
                    info!("tab cache refreshed: {} tabs", snapshot.len());
                    tx.send(snapshot).await.context("tx TabSnapshot")?;
                }
                Err(err) if err.is_closed() => {
                    info!("tab refresh stopped: {}", err);
                    break;
                }
                Err(err) => {
                    error!("tab refresh failed: {}", err);
                }
            }
        }

        Ok(())
    }
}
