mod broadcaster;
mod event;

pub use broadcaster::{Broadcaster, Subscription, DEFAULT_SUBSCRIBER_BUFFER};
pub use event::{EventKind, JobEvent};
