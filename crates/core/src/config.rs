use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VigilError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Level matching ────────────────────────────────────────────

/// How an event level is compared with a rule's level threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelMatching {
    /// A rule matches when its threshold is at or above the event level:
    /// INFORMATIONAL events reach every rule, ERROR events only ERROR rules.
    #[default]
    Legacy,
    /// A rule matches when the event level is at or above its threshold.
    AtOrAbove,
}

impl fmt::Display for LevelMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelMatching::Legacy => write!(f, "legacy"),
            LevelMatching::AtOrAbove => write!(f, "at_or_above"),
        }
    }
}

impl FromStr for LevelMatching {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "legacy" => Ok(LevelMatching::Legacy),
            "at_or_above" => Ok(LevelMatching::AtOrAbove),
            other => Err(VigilError::UnknownVariant {
                kind: "level matching",
                value: other.to_string(),
            }),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
    pub scheduler: SchedulerConfig,
    pub publisher: PublisherConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `VIGIL_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("VIGIL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
            scheduler: SchedulerConfig::from_env_profiled(p),
            publisher: PublisherConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  rules:       dir={}, catalog={}, level_matching={}",
            self.rules.rules_dir.display(),
            self.rules
                .catalog_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string()),
            self.rules.level_matching
        );
        tracing::info!(
            "  scheduler:   shutdown_timeout={}s",
            self.scheduler.shutdown_timeout_secs
        );
        tracing::info!("  publisher:   webhook_timeout={}s", self.publisher.webhook_timeout_secs);
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub rules_dir: PathBuf,
    /// JSON snapshot with the project hierarchy (and optionally findings).
    pub catalog_path: Option<PathBuf>,
    pub level_matching: LevelMatching,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        let level_matching = match profiled_env_opt(p, "VIGIL_LEVEL_MATCHING") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid VIGIL_LEVEL_MATCHING, using legacy");
                LevelMatching::Legacy
            }),
            None => LevelMatching::Legacy,
        };
        Self {
            rules_dir: PathBuf::from(profiled_env_or(p, "RULES_DIR", "data/rules")),
            catalog_path: profiled_env_opt(p, "CATALOG_PATH").map(PathBuf::from),
            level_matching,
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long shutdown waits for in-flight scheduled runs.
    pub shutdown_timeout_secs: u64,
}

impl SchedulerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            shutdown_timeout_secs: profiled_env_u64(p, "SCHEDULER_SHUTDOWN_TIMEOUT_SECS", 10),
        }
    }
}

// ── Publishers ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub webhook_timeout_secs: u64,
}

impl PublisherConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            webhook_timeout_secs: profiled_env_u64(p, "WEBHOOK_TIMEOUT_SECS", 30),
        }
    }
}
