//! Wire protocol shared by the Lockbox server and client.
//!
//! Every method is an HTTP POST to `/<service>/<Method>`. Call metadata
//! travels as request headers. Unary bodies are JSON; streamed bodies are
//! sequences of length-delimited records (see [`frame`]).

pub mod frame;
pub mod messages;
pub mod method;
pub mod status;
pub mod transfer;

pub use frame::{encode_one, Frame, FrameCodec, JsonCodec};
pub use method::Method;
pub use status::{Code, Status};
pub use transfer::FrameSequencer;
