pub mod conversation;
pub mod message;
pub mod time;

pub use conversation::*;
pub use message::*;
pub use time::{format_timestamp, parse_timestamp, to_millis};
