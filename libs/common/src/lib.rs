//! Shared plumbing for modlens tools
//!
//! Provides the ambient pieces every binary needs:
//! - logging initialisation and its configuration types
//! - graceful shutdown (signals to cancellation token)

pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use shutdown::{spawn_shutdown_listener, wait_for_shutdown};

// Re-export common dependencies
pub use tokio_util::sync::CancellationToken;
