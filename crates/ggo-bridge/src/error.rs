use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors returned by [`crate::session::BridgeHandle`] operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no open device session")]
    NotConnected,

    #[error("bridge actor has shut down")]
    ActorShutdown,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
