use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, maps to `grocha.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrochaConfig {
    pub discord: DiscordConfig,
    pub guild: GuildConfig,
    pub memory: MemoryConfig,
    pub grodle: GrodleConfig,
    pub autoreact: AutoreactConfig,
    pub moderation: ModerationConfig,
    pub services: ServicesConfig,
    pub ops: OpsConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

// ── Discord ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token from the Discord developer portal.
    pub token: String,
    /// REST API base URL.
    pub api_base: String,
    /// Gateway WebSocket URL.
    pub gateway_url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: "https://discord.com/api/v10".into(),
            gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".into(),
        }
    }
}

// ── Guild directory names ──────────────────────────────────────

/// Names resolved against every guild's directory when its session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    pub welcome_channel: String,
    /// Greetings and kick votes are posted here.
    pub main_channel: String,
    /// Fault diagnostics are posted here.
    pub debug_channel: String,
    /// Role granted once a greeting is approved.
    pub main_role: String,
    /// Custom emoji used to approve greetings and kicks.
    pub grant_emoji: String,
    pub lick_emoji: String,
    pub revolution_emoji: String,
    /// Name used in replies and audit reasons.
    pub bot_name: String,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            welcome_channel: "bienvenue".into(),
            main_channel: "general".into(),
            debug_channel: "debug".into(),
            main_role: "membre".into(),
            grant_emoji: "grant".into(),
            lick_emoji: "lick".into(),
            revolution_emoji: "com".into(),
            bot_name: "Grocha".into(),
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Directory holding one `memory-<guild>.json` document per guild.
    pub dir: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

// ── Grodle ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrodleConfig {
    /// Longest secret word accepted.
    pub max_letters: usize,
    /// Once more letters than this are known absent, hints list the remaining
    /// candidates instead.
    pub absent_hint_threshold: usize,
}

impl Default for GrodleConfig {
    fn default() -> Self {
        Self {
            max_letters: 10,
            absent_hint_threshold: 10,
        }
    }
}

// ── Autoreact ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoreactConfig {
    /// Chance that each registered emoji is applied to a matching message.
    pub probability: f64,
}

impl Default for AutoreactConfig {
    fn default() -> Self {
        Self { probability: 0.5 }
    }
}

// ── Moderation ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Distinct approvers needed to grant the main role to a newcomer.
    pub grant_quorum: usize,
    /// Distinct approvers needed to kick.
    pub kick_quorum: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            grant_quorum: 1,
            kick_quorum: 3,
        }
    }
}

// ── External services ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub openweather_api_key: Option<String>,
    pub openweather_base: String,
    /// Wiktionary used to check proposed Grodle words.
    pub wiktionary_base: String,
    pub default_city: String,
    pub default_lat: f64,
    pub default_lon: f64,
    /// IANA zone used by the `weekend` countdown.
    pub timezone: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            openweather_api_key: None,
            openweather_base: "https://api.openweathermap.org".into(),
            wiktionary_base: "https://fr.wiktionary.org".into(),
            default_city: "Paris".into(),
            default_lat: 48.85341,
            default_lon: 2.3488,
            timezone: "Europe/Paris".into(),
        }
    }
}

// ── Process operations ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    /// Git checkout reported by `version` and pulled by `update`.
    pub repo_dir: PathBuf,
    /// systemd user unit restarted by `restart`.
    pub service_name: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            service_name: "bot-grocha".into(),
        }
    }
}

// ── Runtime ────────────────────────────────────────────────────

/// What the fault handler does with an unhandled handler error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultMode {
    /// Apologize in the originating channel, post diagnostics to the debug
    /// channel, keep running.
    #[default]
    Report,
    /// Hand the error back to the caller (test harnesses, debugging).
    Propagate,
}

impl std::str::FromStr for FaultMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "report" => Ok(FaultMode::Report),
            "propagate" | "rethrow" => Ok(FaultMode::Propagate),
            other => Err(format!("unknown fault mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub fault_mode: FaultMode,
    /// Messages read per channel by the `emojis` scan.
    pub emoji_scan_limit: usize,
    /// Minimum delay between two progress edits of a long scan.
    pub progress_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fault_mode: FaultMode::Report,
            emoji_scan_limit: 1000,
            progress_interval_ms: 1000,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl GrochaConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Token ───
        if self.discord.token.is_empty() {
            warnings.push(ConfigWarning {
                field: "discord.token".into(),
                message: "no bot token — `start` will not be able to connect".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set discord.token or export GROCHA_DISCORD_TOKEN".into()),
            });
        }

        // ── Directory names ───
        if self.guild.main_role.is_empty() {
            warnings.push(ConfigWarning {
                field: "guild.main_role".into(),
                message: "main role name is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Name the role granted to approved newcomers".into()),
            });
        }
        if self.guild.main_channel.is_empty() {
            warnings.push(ConfigWarning {
                field: "guild.main_channel".into(),
                message: "main channel name is empty — greetings and votes can't be posted".into(),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        // ── Autoreact ───
        if !(0.0..=1.0).contains(&self.autoreact.probability) {
            warnings.push(ConfigWarning {
                field: "autoreact.probability".into(),
                message: format!("probability {} is out of range", self.autoreact.probability),
                severity: WarningSeverity::Error,
                hint: Some("Probability must be between 0.0 and 1.0".into()),
            });
        }

        // ── Quorums ───
        if self.moderation.grant_quorum == 0 || self.moderation.kick_quorum == 0 {
            warnings.push(ConfigWarning {
                field: "moderation".into(),
                message: "a quorum of 0 would approve without any vote".into(),
                severity: WarningSeverity::Error,
                hint: Some("Use at least 1 (defaults: grant 1, kick 3)".into()),
            });
        } else if self.moderation.kick_quorum < 2 {
            warnings.push(ConfigWarning {
                field: "moderation.kick_quorum".into(),
                message: "a single member can kick anyone".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Grodle ───
        if self.grodle.max_letters == 0 {
            warnings.push(ConfigWarning {
                field: "grodle.max_letters".into(),
                message: "max_letters is 0 — no word can ever be proposed".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 10".into()),
            });
        }

        // ── Services ───
        if self.services.openweather_api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "services.openweather_api_key".into(),
                message: "no OpenWeather key — `meteo` will fail".into(),
                severity: WarningSeverity::Info,
                hint: Some("export OPENWEATHER_API_KEY=...".into()),
            });
        }
        if self.services.timezone.parse::<chrono_tz::Tz>().is_err() {
            warnings.push(ConfigWarning {
                field: "services.timezone".into(),
                message: format!("'{}' does not look like an IANA zone", self.services.timezone),
                severity: WarningSeverity::Warning,
                hint: Some("e.g. Europe/Paris".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
