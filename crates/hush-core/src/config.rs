use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (hush.toml + HUSH_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HushConfig {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub whisper: WhisperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Whisper lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// Operator identity with oversight across all groups.
    pub owner_id: i64,
    /// Public channel users must join before whispering (without the @).
    /// Empty string disables the membership gate entirely.
    #[serde(default)]
    pub required_channel: String,
    /// What to do when the membership check itself errors.
    #[serde(default)]
    pub gate_policy: GatePolicy,
    /// Whether a reveal edits the group notification.
    #[serde(default)]
    pub read_receipt: ReadReceipt,
    /// How long a pending whisper request stays alive.
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_secs: u64,
    /// How long the transient guide message survives in the group.
    #[serde(default = "default_guide_delete")]
    pub guide_delete_secs: u64,
}

/// Membership gate behavior when the external check cannot be performed.
///
/// The original service denied on lookup errors, so fail-closed is the
/// default. This is an explicit deployment policy, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GatePolicy {
    #[default]
    FailClosed,
    FailOpen,
}

/// Read-receipt policy for the visibility gate.
///
/// `Passive` records the Sent→Read transition without touching the group
/// notification. `Active` edits the notification to a terminal read banner
/// with a secondary reveal-again action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReadReceipt {
    #[default]
    Passive,
    Active,
}

fn default_pending_ttl() -> u64 {
    300
}
fn default_guide_delete() -> u64 {
    180
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.hush/hush.db", home)
}

impl HushConfig {
    /// Load config from a TOML file with HUSH_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.hush/hush.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: HushConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HUSH_").split("_"))
            .extract()
            .map_err(|e| crate::error::HushError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.hush/hush.toml", home)
}
