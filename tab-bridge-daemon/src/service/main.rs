use crate::prelude::*;

use super::{events::TabEventService, listener::ListenerService, upstream::UpstreamService};

pub struct MainService {
    _upstream: UpstreamService,
    _events: TabEventService,
    _listener: ListenerService,
}

impl Service for MainService {
    type Bus = MainBus;
    type Lifeline = anyhow::Result<Self>;

    fn spawn(bus: &Self::Bus) -> Self::Lifeline {
        debug!("Launching MainService");

        let _upstream = UpstreamService::spawn(bus)?;
        let _events = TabEventService::spawn(bus)?;
        let _listener = ListenerService::spawn(bus)?;

        Ok(Self {
            _upstream,
            _events,
            _listener,
        })
    }
}
