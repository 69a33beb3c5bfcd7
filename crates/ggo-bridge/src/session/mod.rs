//! The device session.
//!
//! ```text
//!  ┌───────────────┐  mpsc commands   ┌──────────────────────────────┐
//!  │ BridgeHandle  │─────────────────▶│ BridgeActor                  │
//!  │ (cloneable)   │◀─ oneshot reply ─│  owns: VariableSink,         │
//!  └──────┬────────┘                  │  Coalescer, LivenessMonitor, │
//!         │ subscribe                 │  Option<open transport>      │
//!         ▼                           └──────▲──────────────▲────────┘
//!  broadcast<VariableUpdate>                 │ TransportEvent│ deadlines
//!                                     ┌──────┴──────┐  ┌─────┴─────┐
//!                                     │ UDP receive │  │ sleep_until│
//!                                     └─────────────┘  └───────────┘
//! ```
//!
//! At most one transport is open at a time. All bridge state is mutated
//! only from the actor's loop.

mod actor;
mod actor_types;
mod handle;

pub use actor::BridgeActor;
pub use actor_types::{ActorConfig, CommandArgs};
pub use handle::BridgeHandle;
