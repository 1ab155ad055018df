//! # Quorum Signing (Layer 4) - Orchestration
//!
//! Coordinates t-of-n threshold signing among a bonded, dynamic signer set.
//!
//! - **registry**: `SignerRegistry`, the Active set, FIFO waitlist, quorum
//!   threshold `floor(2n/3) + 1`, slashing and resharing epochs
//! - **session** / **manager**: `SessionManager` and the signing session
//!   state machine (Pending, InProgress, Complete, Failed, Expired)
//! - **schemes**: FROST, CGGMP21 and Ringtail combiners behind `Combiner`
//! - **workers** / **sweeper**: background loops for transport, callbacks
//!   and expiry
//! - **service**: `SigningService`, which wires all of the above together
//!
//! The combiner is the only step that runs outside the manager's lock. Its
//! result is committed with a compare-and-set on the session status so a
//! concurrent expiry always wins.

#![forbid(unsafe_code)]

pub mod manager;
pub mod registry;
pub mod schemes;
pub mod service;
pub mod session;
pub mod sweeper;
pub mod workers;

pub use manager::SessionManager;
pub use registry::{
    threshold_for, GroupKey, Signer, SignerRegistry, SignerSetView, SignerStatus, SlashOutcome,
};
pub use schemes::{combiner_for, SchemeCombiner};
pub use service::SigningService;
pub use session::{SessionStats, SessionStatus, SessionView, SigningSession};
pub use sweeper::{ExpirySweeper, SweepReport};
pub use workers::{run_callback_worker, run_transport_worker, WorkerQueues};
