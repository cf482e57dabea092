use crate::{
    client::UpstreamClient,
    message::upstream::UpstreamCall,
    prelude::*,
    resource::ListenerResource,
    service::connection::{accept_connection, ConnectionSession},
    state::cache::TabCache,
};
use std::time::Duration;
use tab_bridge_api::{config::BridgeConfig, tab::TabSnapshot};
use tokio::{net::UnixListener, time};

/// Accepts launcher connections.  Each connection is served by its own task.
pub struct ListenerService {
    _accept: Lifeline,
}

impl Service for ListenerService {
    type Bus = MainBus;
    type Lifeline = anyhow::Result<Self>;

    fn spawn(bus: &Self::Bus) -> Self::Lifeline {
        let ListenerResource(listener) = bus.resource::<ListenerResource>()?;
        let config = bus.resource::<BridgeConfig>()?;

        let session = ConnectionSession {
            pid: config.pid,
            client: UpstreamClient::new(bus.tx::<UpstreamCall>()?),
            cache: TabCache::new(bus.rx::<TabSnapshot>()?),
        };

        let _accept = Self::try_task("accept", Self::accept(listener, session));

        Ok(Self { _accept })
    }
}

impl ListenerService {
    async fn accept(listener: UnixListener, session: ConnectionSession) -> anyhow::Result<()> {
        let mut index = 0usize;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let name = format!("connection_{}", index);
                    debug!("{} opened", name);

                    let session = session.clone();
                    tokio::spawn(async move {
                        match accept_connection(session, stream).await {
                            Ok(()) => debug!("{} closed", name),
                            Err(e) => error!("{} failed: {}", name, e),
                        }
                    });

                    index += 1;
                }
                Err(e) => {
                    error!("socket accept failed: {}", e);
                    time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}
