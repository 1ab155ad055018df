//! # Quorum Effects (Layer 3) - Production Handlers
//!
//! Stateless implementations of the effect traits declared in `quorum-core`.
//! Mock and controllable handlers belong in `quorum-testkit`, not here.

#![forbid(unsafe_code)]

pub mod callback;
pub mod time;
pub mod transport;

pub use callback::TracingCallbackHandler;
pub use time::RealTimeHandler;
pub use transport::TracingTransport;
