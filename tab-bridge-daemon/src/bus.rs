use crate::{
    message::{
        main::MainShutdown,
        upstream::{TabsChanged, UpstreamCall},
    },
    resource::{ListenerResource, UpstreamResource},
};
use lifeline::{lifeline_bus, Message, Resource};
use postage::{mpsc, watch};
use tab_bridge_api::{config::BridgeConfig, tab::TabSnapshot};

lifeline_bus!(pub struct MainBus);

impl Message<MainBus> for MainShutdown {
    type Channel = mpsc::Sender<Self>;
}

impl Message<MainBus> for UpstreamCall {
    type Channel = mpsc::Sender<Self>;
}

impl Message<MainBus> for TabsChanged {
    type Channel = mpsc::Sender<Self>;
}

/// The tab cache.  Written by the refresh loop, read by `list` connections.
impl Message<MainBus> for TabSnapshot {
    type Channel = watch::Sender<Self>;
}

impl Resource<MainBus> for BridgeConfig {}
impl Resource<MainBus> for UpstreamResource {}
impl Resource<MainBus> for ListenerResource {}
