//! Quorum Testing Infrastructure
//!
//! Deterministic stand-ins for every effect the signing core consumes, plus
//! fixtures that produce scheme-correct partial signatures.
//!
//! ```toml
//! [dev-dependencies]
//! quorum-testkit = { path = "../quorum-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod combiners;
pub mod fixtures;
pub mod rounds;
pub mod time;
pub mod transport;

pub use combiners::{ConcatCombiner, FailingCombiner, GatedCombiner};
pub use fixtures::*;
pub use rounds::SigningRound;
pub use time::ControllableClock;
pub use transport::{ChannelTransport, RecordingCallbacks, RecordingTransport};
