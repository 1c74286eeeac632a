//! Center-point stream to the downstream consumer.
//!
//! One fire-and-forget TCP connection carries fixed 8-byte messages, see
//! [`wire`]. Delivery failures never stop the frame loop.

mod sender;
pub mod wire;

pub use sender::{
    CenterSink, SendOutcome, SendPolicy, SenderStats, StreamConfig, TcpSender,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_BACKOFF, DEFAULT_SEND_TIMEOUT, DEFAULT_STREAM_ADDR,
};
pub use wire::{decode_stream, StreamMessage, MESSAGE_LEN};
