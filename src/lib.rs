//! ## Wamble server
//!
//! Ties the wire protocol (`codec`), move engine (`engine`), and board/player/
//! spectator registries (`registry`) together into a runnable multi-profile
//! server: one blocking UDP listener thread per profile, no shared state
//! between profiles beyond the read-only list each can see the others in.

pub mod config;
pub mod dispatch;
pub mod hotreload;
pub mod listener;
pub mod runtime;
pub mod scoring;
pub mod snapshot;

use anyhow::Result;

use config::Config;
use runtime::Supervisor;

/// Boots every configured profile and blocks until they all exit.
pub fn startup(config: Config) -> Result<()> {
    let supervisor = Supervisor::start(config.profiles)?;
    supervisor.run_forever();
    Ok(())
}
