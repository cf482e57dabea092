pub use crate::bus::MainBus;
pub use anyhow::Context;
pub use lifeline::{Bus, Lifeline, Service, Task};
pub use log::{debug, error, info, trace, warn};
pub use postage::{sink::Sink, stream::Stream};
