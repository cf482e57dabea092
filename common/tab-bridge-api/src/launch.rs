//! Process lifecycle helpers for the bridge entrypoint.
use log::*;
use postage::stream::Stream;
use std::time::Duration;
use tokio::{select, signal::ctrl_c, time};

/// Waits for either a ctrl-c signal, or a message on the given channel.
///
/// Useful in main() functions.
pub async fn wait_for_shutdown<T>(mut receiver: impl Stream<Item = T> + Unpin) {
    info!("Waiting for termination");

    select! {
        _ = ctrl_c() => {
            info!("Received ctrl-c");
        },
        _ = receiver.recv() => {
            // wait just a few moments for in-flight socket responses to flush.
            time::sleep(Duration::from_millis(20)).await;
        }
    }

    info!("Complete.  Shutting down");
}
