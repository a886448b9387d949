//! Tracing setup for binaries and examples built on tracks_sim.

use crate::error::SimResult;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_tracing(level: Level) -> SimResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
