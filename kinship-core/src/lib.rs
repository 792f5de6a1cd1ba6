//! # Kinship Core Library
//!
//! Friend relationships for players on a multi-server network.
//!
//! Each player owns a [`SocialRecord`]: friends (with best-friend flags),
//! pending requests in both directions, blocked and ignored players, and a
//! notification toggle. The [`SocialService`] keeps the records of online
//! players resident in a [`RecordCache`], persists them through a [`Backend`]
//! chosen once at startup, and orchestrates the operations that touch two
//! records at once (see [`protocol`]).
//!
//! ## Consistency Contract
//!
//! - Single-record invariants (`best_friends ⊆ friends`, a blocked player is
//!   never a friend or pending request) always hold.
//! - Cross-record symmetry is best effort: no lock or transaction spans two
//!   records, and an offline counterpart is brought up to date when its
//!   record is next activated.
//! - A failed save is reported to the caller; the in-memory record is not
//!   rolled back.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod error;
pub mod protocol;
pub mod record;
pub mod service;
pub mod storage;
pub mod types;

pub use cache::{RecordCache, SharedRecord};
pub use config::{KinshipConfig, StorageKind};
pub use error::{KinshipError, Result};
pub use protocol::{Outcome, Rejection};
pub use record::{InboundEdges, ReconcileReport, SocialRecord};
pub use service::SocialService;
pub use storage::Backend;
pub use types::PlayerId;
