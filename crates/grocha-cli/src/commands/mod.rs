use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use grocha_config::{ConfigLoader, GrochaConfig, WarningSeverity};
use grocha_core::GrochaError;

mod start;

/// 🐱 Grocha — guild companion: votes, autoreacts and Grodle
#[derive(Parser)]
#[command(name = "grocha", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to grocha.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve every guild the bot is in
    Start,
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Audit the configuration
    Check,
    /// Show version and build info
    Version,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Log filter: --verbose > --quiet > --log-level > config `logging.level`.
pub fn resolve_log_level(
    verbose: bool,
    quiet: bool,
    explicit: Option<&str>,
    configured: &str,
) -> String {
    if verbose {
        "debug".into()
    } else if quiet {
        "error".into()
    } else {
        explicit.unwrap_or(configured).to_string()
    }
}

impl Cli {
    pub fn config_path(&self) -> Option<&std::path::Path> {
        self.config.as_deref()
    }

    pub async fn run(self) -> grocha_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        let log_level = resolve_log_level(
            self.verbose,
            self.quiet,
            self.log_level.as_deref(),
            &config.logging.level,
        );

        // RUST_LOG wins over every flag
        if config.logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
                )
                .json()
                .with_target(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
                )
                .with_target(false)
                .init();
        }

        match self.command {
            Commands::Start => start::cmd_start(config, config_loader).await,
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Check => Self::cmd_check(config, config_loader.path()),
            Commands::Version => Self::cmd_version(),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_config(config: GrochaConfig, json: bool) -> grocha_core::Result<()> {
        let rendered = if json {
            serde_json::to_string_pretty(&config)?
        } else {
            toml::to_string_pretty(&config).map_err(|e| GrochaError::Config(e.to_string()))?
        };
        println!("{rendered}");
        Ok(())
    }

    fn cmd_check(config: GrochaConfig, path: &std::path::Path) -> grocha_core::Result<()> {
        println!("🩺 Grocha check — {}", path.display());
        println!();

        let warnings = match config.validate() {
            Ok(w) => w,
            Err(e) => {
                println!("{e}");
                return Err(GrochaError::Config("configuration is invalid".into()));
            }
        };

        let mut warn_count = 0;
        let mut info_count = 0;
        for w in &warnings {
            println!("  {w}");
            match w.severity {
                WarningSeverity::Warning => warn_count += 1,
                WarningSeverity::Info => info_count += 1,
                WarningSeverity::Error => {}
            }
        }

        println!();
        println!(
            "  Guild names: #{} (main) #{} (debug) @{} (role) :{}: (grant)",
            config.guild.main_channel,
            config.guild.debug_channel,
            config.guild.main_role,
            config.guild.grant_emoji
        );
        println!(
            "  Quorums: grant {} / kick {}",
            config.moderation.grant_quorum, config.moderation.kick_quorum
        );
        println!("  Memory: {}", config.memory.dir.display());
        println!();
        println!("  ⚠️  {warn_count} warnings, 💡 {info_count} suggestions");
        Ok(())
    }

    fn cmd_version() -> grocha_core::Result<()> {
        println!("🐱 Grocha v{}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> grocha_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "grocha", &mut std::io::stdout());
        Ok(())
    }
}
