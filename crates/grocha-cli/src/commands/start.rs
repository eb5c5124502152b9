use std::sync::Arc;
use tracing::{info, warn};

use grocha_channels::{DiscordPlatform, Platform};
use grocha_config::{ConfigLoader, GrochaConfig};
use grocha_core::GrochaError;
use grocha_runtime::{GuildRuntime, SessionContext};

pub(super) async fn cmd_start(
    config: GrochaConfig,
    config_loader: ConfigLoader,
) -> grocha_core::Result<()> {
    println!("🐱 Grocha v{}", env!("CARGO_PKG_VERSION"));
    println!("   Memory: {}", config.memory.dir.display());
    println!("   Fault mode: {:?}", config.runtime.fault_mode);
    println!();

    if config.discord.token.is_empty() {
        return Err(GrochaError::ConfigValidation {
            field: "discord.token".into(),
            reason: "a bot token is required to connect".into(),
        });
    }
    if config.services.openweather_api_key.is_none() {
        warn!("no OpenWeather key, `meteo` will fail");
    }

    // Kept alive for the duration of the runtime
    let _watcher = match config_loader.watch() {
        Ok(w) => {
            println!("   Config hot-reload: enabled");
            Some(w)
        }
        Err(e) => {
            warn!(error = %e, "config hot-reload disabled");
            None
        }
    };

    let platform = Arc::new(DiscordPlatform::new(
        config.discord.token.clone(),
        config.discord.api_base.clone(),
        config.discord.gateway_url.clone(),
    ));
    let ctx = SessionContext::from_config(platform.clone(), config_loader.shared());

    let events = platform.start().await?;
    let runtime = GuildRuntime::new(ctx);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    runtime.run(events, shutdown).await?;

    platform.stop().await?;
    info!("grocha stopped");
    Ok(())
}
