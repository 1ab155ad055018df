//! # Quorum Core (Layer 1) - Interfaces
//!
//! Shared vocabulary for bonded threshold signing:
//!
//! - **identifiers**: `NodeId`, `ChainAddress`, `SessionId`, `Hash32`
//! - **errors**: the unified `QuorumError` and its taxonomy (`ErrorKind`)
//! - **config**: `QuorumConfig` with file/env loading and validation
//! - **time**: the injected `PhysicalTimeEffects` clock
//! - **effects**: the pluggable capabilities consumed by the signing core
//!   (`Combiner`, `SignerTransport`, `CallbackEffects`) and the task messages
//!   handed to them
//!
//! Nothing in this crate holds mutable state or spawns tasks. Orchestration
//! lives in `quorum-signing`; production handlers live in `quorum-effects`.

#![forbid(unsafe_code)]

pub mod config;
pub mod effects;
pub mod errors;
pub mod hash;
pub mod identifiers;
pub mod time;

pub use config::{QuorumConfig, ThresholdScheme};
pub use effects::{
    CallbackEffects, CallbackError, CallbackRequest, CallbackTask, CombineError, Combiner,
    SignerTransport, SigningTask, TransportError,
};
pub use errors::{ErrorKind, QuorumError, Result};
pub use identifiers::{ChainAddress, Hash32, NodeId, SessionId};
pub use time::{PhysicalTime, PhysicalTimeEffects, TimeError};

/// Collateral amount in the host chain's base unit.
pub type BondAmount = u128;

/// Denominator for slashing percentages expressed in basis points.
pub const BASIS_POINTS: u32 = 10_000;
