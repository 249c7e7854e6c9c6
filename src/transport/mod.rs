// Transport module
// Sequential request/acknowledge delivery of raw records to a device link

pub mod sender;

pub use sender::{send_events, SendReport, TransportError, TransportOptions};
