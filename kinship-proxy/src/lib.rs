//! # kinship-proxy: Proxy Integration for Kinship
//!
//! The layer between the network proxy and `kinship-core`. The proxy reports
//! session events; this crate turns them into record activation, eviction
//! and presence notices, and serves the read-only views commands need.
//!
//! ## Modules
//!
//! - `events`: session lifecycle events reported by the proxy
//! - `hooks`: event handling against a running `SocialService`
//! - `presence`: friend joined/left notices
//! - `suggest`: tab-completion candidates for social commands
//! - `status`: admin status report
//! - `telemetry`: tracing subscriber setup

pub mod events;
pub mod hooks;
pub mod presence;
pub mod status;
pub mod suggest;
pub mod telemetry;

pub use events::SessionEvent;
pub use hooks::SessionHooks;
pub use presence::Notice;
pub use status::StatusReport;
