#[cfg(test)]
mod tests {
    use grocha_config::ConfigLoader;
    use grocha_config::schema::*;
    use std::io::Write;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_grocha_config_defaults() {
        let config = GrochaConfig::default();
        assert_eq!(config.grodle.max_letters, 10);
        assert_eq!(config.grodle.absent_hint_threshold, 10);
        assert_eq!(config.autoreact.probability, 0.5);
        assert_eq!(config.runtime.fault_mode, FaultMode::Report);
        assert_eq!(config.runtime.emoji_scan_limit, 1000);
    }

    #[test]
    fn test_moderation_config_defaults() {
        let config = ModerationConfig::default();
        assert_eq!(config.grant_quorum, 1);
        assert_eq!(config.kick_quorum, 3);
    }

    #[test]
    fn test_services_config_defaults() {
        let config = ServicesConfig::default();
        assert_eq!(config.default_city, "Paris");
        assert_eq!(config.timezone, "Europe/Paris");
        assert!(config.openweather_api_key.is_none());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }

    // ── TOML roundtrip tests ───────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = GrochaConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: GrochaConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.guild.main_role, config.guild.main_role);
        assert_eq!(restored.moderation.kick_quorum, config.moderation.kick_quorum);
        assert_eq!(restored.runtime.fault_mode, config.runtime.fault_mode);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[guild]
main_role = "chats"

[runtime]
fault_mode = "propagate"
"#;
        let config: GrochaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.guild.main_role, "chats");
        assert_eq!(config.runtime.fault_mode, FaultMode::Propagate);
        // Defaults should fill in
        assert_eq!(config.guild.grant_emoji, "grant");
        assert_eq!(config.grodle.max_letters, 10);
        assert_eq!(config.runtime.progress_interval_ms, 1000);
    }

    #[test]
    fn test_fault_mode_from_str() {
        assert_eq!("report".parse::<FaultMode>().unwrap(), FaultMode::Report);
        assert_eq!("Propagate".parse::<FaultMode>().unwrap(), FaultMode::Propagate);
        assert_eq!("rethrow".parse::<FaultMode>().unwrap(), FaultMode::Propagate);
        assert!("panic".parse::<FaultMode>().is_err());
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_validate_defaults_ok() {
        let config = GrochaConfig::default();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "discord.token"));
        assert!(warnings.iter().all(|w| w.severity != WarningSeverity::Error));
    }

    #[test]
    fn test_validate_rejects_empty_main_role() {
        let mut config = GrochaConfig::default();
        config.guild.main_role.clear();
        let err = config.validate().unwrap_err();
        assert!(err.contains("guild.main_role"));
    }

    #[test]
    fn test_validate_rejects_probability_out_of_range() {
        let mut config = GrochaConfig::default();
        config.autoreact.probability = 1.5;
        assert!(config.validate().unwrap_err().contains("autoreact.probability"));
    }

    #[test]
    fn test_validate_rejects_zero_quorum() {
        let mut config = GrochaConfig::default();
        config.moderation.kick_quorum = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_warns_on_bad_timezone() {
        let mut config = GrochaConfig::default();
        config.services.timezone = "Mars/Olympus".into();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "services.timezone"));
    }

    #[test]
    fn test_warning_display_includes_hint() {
        let w = ConfigWarning {
            field: "grodle.max_letters".into(),
            message: "zero".into(),
            severity: WarningSeverity::Error,
            hint: Some("Set to e.g. 10".into()),
        };
        let s = w.to_string();
        assert!(s.contains("grodle.max_letters"));
        assert!(s.contains("Set to e.g. 10"));
    }

    // ── ConfigLoader tests ─────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("grocha.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[guild]
main_channel = "salon"
grant_emoji = "ok"

[moderation]
kick_quorum = 4
"#
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(&config_path)).unwrap();
        let config = loader.get();
        assert_eq!(config.guild.main_channel, "salon");
        assert_eq!(config.guild.grant_emoji, "ok");
        assert_eq!(config.moderation.kick_quorum, 4);
        assert_eq!(loader.path(), config_path.as_path());
    }

    #[test]
    fn test_config_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(loader.get().grodle.max_letters, 10);
    }

    #[test]
    fn test_config_loader_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("grocha.toml");
        std::fs::write(&config_path, "[guild\nmain_role = ").unwrap();
        assert!(ConfigLoader::load(Some(&config_path)).is_err());
    }

    #[test]
    fn test_config_loader_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("grocha.toml");
        std::fs::write(&config_path, "[grodle]\nmax_letters = 0\n").unwrap();
        let err = ConfigLoader::load(Some(&config_path)).err().unwrap();
        assert!(err.to_string().contains("max_letters"));
    }

    #[test]
    fn test_config_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("grocha.toml");
        std::fs::write(&config_path, "[grodle]\nmax_letters = 8\n").unwrap();
        let loader = ConfigLoader::load(Some(&config_path)).unwrap();
        assert_eq!(loader.get().grodle.max_letters, 8);

        std::fs::write(&config_path, "[grodle]\nmax_letters = 6\n").unwrap();
        loader.reload().unwrap();
        assert_eq!(loader.get().grodle.max_letters, 6);
        assert_eq!(loader.shared().read().grodle.max_letters, 6);
    }

    #[test]
    fn test_config_reload_rejects_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("grocha.toml");
        std::fs::write(&config_path, "[autoreact]\nprobability = 0.25\n").unwrap();
        let loader = ConfigLoader::load(Some(&config_path)).unwrap();

        std::fs::write(
            &config_path,
            "[autoreact]\nprobability = nan\n\n[moderation]\nkick_quorum = 0\n",
        )
        .unwrap();
        let err = loader.reload().unwrap_err();
        assert!(err.to_string().contains("autoreact.probability"));

        let config = loader.get();
        assert_eq!(config.autoreact.probability, 0.25);
        assert_eq!(config.moderation.kick_quorum, 3);
    }
}
