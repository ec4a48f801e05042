use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ahash::AHashMap;
use anyhow::{Context, Result};
use codec::{AckWaiters, PeerKey, PeerSessionTable, ReliabilityConfig};
use parking_lot::{Mutex, RwLock};
use persistence::{IntentBuffer, MemoryDriver, StorageDriver};
use registry::{BoardPool, PlayerRegistry, PoolLimits, SpectatorLimits, SpectatorManager, Token};

use crate::config::ProfileConfig;
use crate::hotreload;
use crate::scoring::Contribution;

/// What ListProfiles/GetProfileInfo advertise about a profile, sidecar to
/// the `ProfileConfig` itself so peers can't see each other's full config.
#[derive(Debug, Clone)]
pub struct ProfileDirectoryEntry {
    pub name: String,
    pub listen: SocketAddr,
}

/// Per-board tally of who contributed moves on which side, consumed at
/// archive time to compute a payout. Kept in memory only: move history for
/// scoring does not need to survive a crash, only `RecordMove` intents do.
pub struct ContributionLedger {
    by_board: Mutex<AHashMap<u64, Vec<Contribution>>>,
}

impl ContributionLedger {
    fn new() -> Self {
        Self {
            by_board: Mutex::new(AHashMap::new()),
        }
    }

    pub fn record(&self, board_id: u64, contribution: Contribution) {
        self.by_board.lock().entry(board_id).or_default().push(contribution);
    }

    pub fn take(&self, board_id: u64) -> Vec<Contribution> {
        self.by_board.lock().remove(&board_id).unwrap_or_default()
    }
}

/// Everything one profile instance owns: its socket, its reliability and
/// session bookkeeping, its board/player/spectator registries, and its
/// intent buffer. Profiles share nothing with each other.
pub struct ProfileRuntime {
    pub name: String,
    pub socket: UdpSocket,
    pub sessions: PeerSessionTable,
    pub ack_waiters: AckWaiters,
    pub reliability: ReliabilityConfig,
    pub players: PlayerRegistry,
    pub boards: BoardPool,
    pub spectators: SpectatorManager,
    pub contributions: ContributionLedger,
    pub intents: Mutex<IntentBuffer>,
    pub driver: Arc<dyn StorageDriver>,
    pub config: RwLock<Arc<ProfileConfig>>,
    pub should_stop: AtomicBool,
    pub directory: RwLock<Arc<Vec<ProfileDirectoryEntry>>>,
}

impl ProfileRuntime {
    pub fn bind(config: ProfileConfig) -> Result<Arc<Self>> {
        let socket = hotreload::bind_or_inherit(&config.name, config.listen)
            .with_context(|| format!("binding profile '{}' to {}", config.name, config.listen))?;
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;

        let runtime = Arc::new(Self {
            name: config.name.clone(),
            socket,
            sessions: PeerSessionTable::new(Duration::from_secs(config.session_timeout_secs)),
            ack_waiters: AckWaiters::new(),
            reliability: ReliabilityConfig {
                timeout: Duration::from_millis(config.timeout_ms),
                max_retries: config.max_retries,
            },
            players: PlayerRegistry::new(
                config.max_players,
                Duration::from_secs(config.token_expiration_secs),
            ),
            boards: BoardPool::new(PoolLimits {
                min_boards: config.min_boards,
                max_boards: config.max_boards,
                reservation_timeout: Duration::from_secs(config.reservation_timeout_secs),
                inactivity_timeout: Duration::from_secs(config.inactivity_timeout_secs),
            }),
            spectators: SpectatorManager::new(SpectatorLimits {
                visibility: config.spectator_visibility,
                max_spectators: config.max_spectators,
                max_focus_per_session: config.spectator_max_focus_per_session,
                session_timeout: Duration::from_secs(config.session_timeout_secs),
                summary_hz: config.spectator_summary_hz,
                focus_hz: config.spectator_focus_hz,
                summary_changes_only: config.spectator_summary_mode_changes_only,
            }),
            contributions: ContributionLedger::new(),
            intents: Mutex::new(IntentBuffer::new()),
            driver: Arc::new(MemoryDriver::new()),
            config: RwLock::new(Arc::new(config)),
            should_stop: AtomicBool::new(false),
            directory: RwLock::new(Arc::new(Vec::new())),
        });
        runtime.load_state();
        Ok(runtime)
    }

    pub fn config_snapshot(&self) -> Arc<ProfileConfig> {
        self.config.read().clone()
    }

    /// Loads this profile's board state from its snapshot file, if one
    /// exists. Absence is normal on a cold start and is not an error.
    fn load_state(&self) {
        let path = hotreload::state_file_path(&self.name);
        let Ok(mut file) = std::fs::File::open(&path) else {
            return;
        };
        if let Err(err) = crate::snapshot::load_snapshot_into(&self.boards, &mut file) {
            log::warn!("profile '{}': failed to load state from {path:?}: {err}", self.name);
        }
    }

    /// Writes this profile's board state to its snapshot file, for recovery
    /// across a hot-reload exec or a clean restart.
    pub fn save_state(&self) -> Result<()> {
        let path = hotreload::state_file_path(&self.name);
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("creating state file {path:?}"))?;
        crate::snapshot::write_snapshot(&self.boards, self.boards.next_id(), &mut file)
    }

    pub fn peer_key(&self, addr: SocketAddr, token: Token) -> PeerKey {
        PeerKey { addr, token }
    }
}

/// Owns every running profile and the threads driving their listener loops.
pub struct Supervisor {
    profiles: Vec<Arc<ProfileRuntime>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl Supervisor {
    /// Binds every profile's socket up front; if any bind fails the whole
    /// set is abandoned rather than left partially running.
    pub fn start(configs: Vec<ProfileConfig>) -> Result<Self> {
        let mut profiles = Vec::with_capacity(configs.len());
        for config in configs {
            profiles.push(ProfileRuntime::bind(config)?);
        }

        let directory: Arc<Vec<ProfileDirectoryEntry>> = Arc::new(
            profiles
                .iter()
                .map(|p| ProfileDirectoryEntry {
                    name: p.name.clone(),
                    listen: p.socket.local_addr().expect("bound socket has a local address"),
                })
                .collect(),
        );
        for profile in &profiles {
            *profile.directory.write() = directory.clone();
        }

        #[cfg(feature = "affinity")]
        let core_ids: Vec<Option<core_affinity::CoreId>> = core_affinity::get_core_ids()
            .map(|ids| ids.into_iter().map(Some).collect())
            .unwrap_or_else(|| (0..profiles.len()).map(|_| None).collect());

        let handles = profiles
            .iter()
            .cloned()
            .enumerate()
            .map(|(_index, profile)| {
                #[cfg(feature = "affinity")]
                let core_id = core_ids.get(_index).copied().flatten();

                thread::spawn(move || {
                    #[cfg(feature = "affinity")]
                    if let Some(core_id) = core_id {
                        let _ = core_affinity::set_for_current(core_id);
                    }
                    crate::listener::run(profile)
                })
            })
            .collect();

        Ok(Self { profiles, handles })
    }

    /// Blocks the calling thread until every profile's listener loop exits.
    /// Under normal operation that only happens if a profile's thread
    /// panics, since nothing sets `should_stop` during a live run.
    pub fn run_forever(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }

    pub fn stop_and_join(self) {
        for profile in &self.profiles {
            profile.should_stop.store(true, Ordering::Relaxed);
        }
        for handle in self.handles {
            let _ = handle.join();
        }
        for profile in &self.profiles {
            if let Err(err) = profile.save_state() {
                log::warn!("profile '{}': failed to save state on shutdown: {err}", profile.name);
            }
        }
    }

    pub fn profiles(&self) -> &[Arc<ProfileRuntime>] {
        &self.profiles
    }

    /// Whether `configs` names the same set of profiles, by name and listen
    /// address, as the set currently running. A match means a hot reload can
    /// reconcile configuration in place instead of rebinding sockets.
    pub fn matches(&self, configs: &[ProfileConfig]) -> bool {
        if configs.len() != self.profiles.len() {
            return false;
        }
        self.profiles.iter().all(|running| {
            configs
                .iter()
                .any(|c| c.name == running.name && c.listen == running.socket.local_addr().unwrap_or(c.listen))
        })
    }

    /// Swaps each running profile's config pointer to the matching entry in
    /// `configs`, by name. Assumes `matches(configs)` already returned true.
    pub fn reconcile(&self, configs: Vec<ProfileConfig>) {
        for config in configs {
            if let Some(profile) = self.profiles.iter().find(|p| p.name == config.name) {
                *profile.config.write() = Arc::new(config);
            }
        }
    }

    /// Saves every profile's state, clears `FD_CLOEXEC` on every profile's
    /// socket, and builds the `WAMBLE_PROFILES_INHERITED` value a
    /// replacement image should set before it execs. The caller is
    /// responsible for invoking `exec` itself once this returns, since this
    /// crate does not decide when to restart.
    pub fn prepare_for_exec(&self) -> String {
        for profile in &self.profiles {
            if let Err(err) = profile.save_state() {
                log::warn!("profile '{}': failed to save state before exec: {err}", profile.name);
            }
        }
        let entries: Vec<(String, i32)> = self
            .profiles
            .iter()
            .map(|p| (p.name.clone(), hotreload::make_inheritable(&p.socket)))
            .collect();
        hotreload::export_env_value(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(name: &str, port: u16) -> ProfileConfig {
        serde_json5::from_str(&format!(
            r#"{{ "name": "{name}", "listen": "127.0.0.1:{port}" }}"#
        ))
        .unwrap()
    }

    #[test]
    fn matches_same_names_and_ports() {
        let supervisor = Supervisor::start(vec![sample_config("a", 0)]).unwrap();
        let bound_port = supervisor.profiles()[0].socket.local_addr().unwrap().port();

        let same = vec![sample_config("a", bound_port)];
        assert!(supervisor.matches(&same));

        let renamed = vec![sample_config("b", bound_port)];
        assert!(!supervisor.matches(&renamed));

        supervisor.stop_and_join();
    }

    #[test]
    fn reconcile_swaps_config_pointer_in_place() {
        let supervisor = Supervisor::start(vec![sample_config("a", 0)]).unwrap();
        let bound_port = supervisor.profiles()[0].socket.local_addr().unwrap().port();

        let mut updated = sample_config("a", bound_port);
        updated.max_boards = 999;
        supervisor.reconcile(vec![updated]);

        assert_eq!(supervisor.profiles()[0].config_snapshot().max_boards, 999);
        supervisor.stop_and_join();
    }
}
