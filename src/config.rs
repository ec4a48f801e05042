use std::fs::read_to_string;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => return Err(format!("unknown log level: {value}")),
        })
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

/// The phase-multiplier table driving `find_board_for_player`, per §4.2.
#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub struct Assignment {
    #[serde(default = "Assignment::n_new")]
    pub n_new: u32,
    #[serde(default = "Assignment::early_threshold")]
    pub early_threshold: u32,
    #[serde(default = "Assignment::mid_threshold")]
    pub mid_threshold: u32,
    #[serde(default = "Assignment::mult")]
    pub new_player_early_phase_mult: f64,
    #[serde(default = "Assignment::mult")]
    pub new_player_mid_phase_mult: f64,
    #[serde(default = "Assignment::mult")]
    pub new_player_end_phase_mult: f64,
    #[serde(default = "Assignment::mult")]
    pub experienced_player_early_phase_mult: f64,
    #[serde(default = "Assignment::mult")]
    pub experienced_player_mid_phase_mult: f64,
    #[serde(default = "Assignment::mult")]
    pub experienced_player_end_phase_mult: f64,
}

impl Assignment {
    fn n_new() -> u32 {
        10
    }

    fn early_threshold() -> u32 {
        20
    }

    fn mid_threshold() -> u32 {
        60
    }

    fn mult() -> f64 {
        1.0
    }
}

impl Default for Assignment {
    fn default() -> Self {
        Self {
            n_new: Self::n_new(),
            early_threshold: Self::early_threshold(),
            mid_threshold: Self::mid_threshold(),
            new_player_early_phase_mult: Self::mult(),
            new_player_mid_phase_mult: Self::mult(),
            new_player_end_phase_mult: Self::mult(),
            experienced_player_early_phase_mult: Self::mult(),
            experienced_player_mid_phase_mult: Self::mult(),
            experienced_player_end_phase_mult: Self::mult(),
        }
    }
}

/// One independent server instance: its own port, its own board/player
/// registries, its own configuration snapshot. Profiles share no runtime
/// state.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ProfileConfig {
    pub name: String,
    pub listen: SocketAddr,

    #[serde(default = "ProfileConfig::timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "ProfileConfig::max_retries")]
    pub max_retries: u32,
    #[serde(default = "ProfileConfig::buffer_size")]
    pub buffer_size: usize,

    #[serde(default = "ProfileConfig::max_client_sessions")]
    pub max_client_sessions: usize,
    #[serde(default = "ProfileConfig::session_timeout_secs")]
    pub session_timeout_secs: u64,

    #[serde(default = "ProfileConfig::max_boards")]
    pub max_boards: usize,
    #[serde(default = "ProfileConfig::min_boards")]
    pub min_boards: usize,
    #[serde(default = "ProfileConfig::inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    #[serde(default = "ProfileConfig::reservation_timeout_secs")]
    pub reservation_timeout_secs: u64,

    #[serde(default = "ProfileConfig::max_pot")]
    pub max_pot: u64,
    #[serde(default = "ProfileConfig::max_moves_per_board")]
    pub max_moves_per_board: u32,
    #[serde(default = "ProfileConfig::max_contributors")]
    pub max_contributors: u32,

    #[serde(default)]
    pub assignment: Assignment,

    #[serde(default = "ProfileConfig::spectator_visibility")]
    pub spectator_visibility: u8,
    #[serde(default = "ProfileConfig::spectator_summary_hz")]
    pub spectator_summary_hz: f64,
    #[serde(default = "ProfileConfig::spectator_focus_hz")]
    pub spectator_focus_hz: f64,
    #[serde(default)]
    pub spectator_summary_mode_changes_only: bool,
    #[serde(default = "ProfileConfig::spectator_max_focus_per_session")]
    pub spectator_max_focus_per_session: i32,
    #[serde(default = "ProfileConfig::max_spectators")]
    pub max_spectators: usize,
    #[serde(default = "ProfileConfig::admin_trust_level")]
    pub admin_trust_level: u8,

    #[serde(default = "ProfileConfig::token_expiration_secs")]
    pub token_expiration_secs: u64,
    #[serde(default = "ProfileConfig::max_players")]
    pub max_players: usize,

    /// Cleanup sweep cadence; not part of the 1Hz tick.
    #[serde(default = "ProfileConfig::cleanup_interval_sec")]
    pub cleanup_interval_sec: u64,

    /// Path to the database this profile talks to, used only for the
    /// preflight db-isolation check; the schema and driver are out of scope.
    #[serde(default)]
    pub database: Option<String>,
}

impl ProfileConfig {
    /// Builds the per-call phase-multiplier table `find_board_for_player`
    /// needs, from this profile's configured assignment table.
    pub fn phase_multipliers(&self) -> registry::assignment::PhaseMultipliers {
        registry::assignment::PhaseMultipliers {
            new_early: self.assignment.new_player_early_phase_mult,
            new_mid: self.assignment.new_player_mid_phase_mult,
            new_end: self.assignment.new_player_end_phase_mult,
            experienced_early: self.assignment.experienced_player_early_phase_mult,
            experienced_mid: self.assignment.experienced_player_mid_phase_mult,
            experienced_end: self.assignment.experienced_player_end_phase_mult,
        }
    }

    fn timeout_ms() -> u64 {
        250
    }
    fn max_retries() -> u32 {
        4
    }
    fn buffer_size() -> usize {
        1500
    }
    fn max_client_sessions() -> usize {
        4096
    }
    fn session_timeout_secs() -> u64 {
        120
    }
    fn max_boards() -> usize {
        512
    }
    fn min_boards() -> usize {
        8
    }
    fn inactivity_timeout_secs() -> u64 {
        600
    }
    fn reservation_timeout_secs() -> u64 {
        30
    }
    fn max_pot() -> u64 {
        20
    }
    fn max_moves_per_board() -> u32 {
        500
    }
    fn max_contributors() -> u32 {
        32
    }
    fn spectator_visibility() -> u8 {
        0
    }
    fn spectator_summary_hz() -> f64 {
        1.0
    }
    fn spectator_focus_hz() -> f64 {
        4.0
    }
    fn spectator_max_focus_per_session() -> i32 {
        1
    }
    fn max_spectators() -> usize {
        256
    }
    fn admin_trust_level() -> u8 {
        100
    }
    fn token_expiration_secs() -> u64 {
        86400
    }
    fn max_players() -> usize {
        10_000
    }
    fn cleanup_interval_sec() -> u64 {
        30
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub log: Log,
    pub profiles: Vec<ProfileConfig>,
}

impl Config {
    /// Checks that no two advertised profiles share a port, and no two
    /// db-isolated profiles share a database identity. Run before binding
    /// any socket.
    pub fn preflight(&self) -> Result<()> {
        let mut seen_ports = std::collections::HashSet::new();
        let mut seen_dbs = std::collections::HashSet::new();
        for profile in &self.profiles {
            if !seen_ports.insert(profile.listen) {
                anyhow::bail!("two profiles advertise the same listen address: {}", profile.listen);
            }
            if let Some(db) = &profile.database {
                if !seen_dbs.insert(db.clone()) {
                    anyhow::bail!("two db-isolated profiles share database '{db}'");
                }
            }
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to the config file.
    #[arg(long, short)]
    pub config: String,

    /// Restrict this run to a single named profile from the config file.
    #[arg(long, short)]
    pub profile: Option<String>,
}

impl Config {
    /// Loads configuration from the command line and the config file it
    /// points at, restricting to a single profile if `--profile` was given.
    pub fn load() -> Result<Self> {
        let cli = Cli::parse();
        let mut config: Config = serde_json5::from_str(&read_to_string(&cli.config)?)
            .map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        if let Some(name) = cli.profile {
            config.profiles.retain(|p| p.name == name);
            if config.profiles.is_empty() {
                anyhow::bail!("no profile named '{name}' in config");
            }
        }

        config.preflight()?;
        Ok(config)
    }
}
