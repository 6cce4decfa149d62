//! Alert domain - notification channels and dispatch

mod channel;
mod dispatcher;
mod message;

pub use channel::{AudioAlertChannel, MessageChannel};
pub use dispatcher::{AlertDispatcher, ChannelOutcome, DispatchReport};
pub use message::format_alert_message;
