//! Streaming session engine for Parley.
//!
//! Turns a chunked query response into transcript updates:
//! bytes are split into records by the [`frame`] decoder, classified by the
//! [`interpreter`], folded into the transcript by the pure [`reducer`], and
//! driven end to end by the [`controller`].

pub mod controller;
pub mod error;
pub mod event;
pub mod frame;
pub mod interpreter;
pub mod reducer;
pub mod session;
pub mod transport;

pub use controller::{SessionController, SessionOutcome};
pub use error::{ChatError, FrameError, InterpretError, TransportError};
pub use event::StreamEvent;
pub use frame::{Frame, FrameDecoder};
pub use interpreter::interpret;
pub use reducer::{reduce, Flow, Reduction};
pub use session::SessionState;
pub use transport::{ByteStream, HttpTransport, QueryTransport};
