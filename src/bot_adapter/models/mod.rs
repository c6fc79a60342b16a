pub mod event_model;
pub mod message;

pub use event_model::{MessageEvent, MessageType, Profile, RawMessageEvent};
