//! Green-GO intercom bridge.
//!
//! Keeps a host's variables in sync with a Green-GO device over OSC/UDP:
//! inbound state messages are translated to variable keys, coalesced, and
//! pushed to the [`host::Host`] only when values change. A heartbeat monitor
//! requests full state syncs whenever the device goes quiet.

pub mod coalesce;
pub mod config;
pub mod error;
pub mod host;
pub mod liveness;
pub mod registry;
pub mod session;
pub mod translate;
pub mod transport;

pub use error::BridgeError;
pub use session::{ActorConfig, BridgeActor, BridgeHandle};

/// Build information.
pub mod build_info {
    /// Crate version from Cargo.toml.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
