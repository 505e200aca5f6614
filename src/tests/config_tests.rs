#[cfg(test)]
mod tests {
    use crate::config::{self, AppConfig};
    use std::env;
    use std::fs;
    use tempfile::NamedTempFile;

    // `config` picks the file format from the extension.
    fn write_temp_config(content: &str) -> NamedTempFile {
        let temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        fs::write(temp_file.path(), content).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.server.request_timeout_secs, 600);
        assert!(config.server.session_cookie.is_none());
        assert_eq!(config.polling.scan_interval_ms, 5000);
        assert_eq!(config.polling.results_interval_ms, 5000);
        assert_eq!(config.polling.label_pulse_ms, 500);
        assert_eq!(config.flash.display_ms, 5000);
        assert!(config::validate(&config).is_ok());
    }

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let temp_file = write_temp_config("");

        let loaded = config::load_file(temp_file.path()).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(loaded.server.base_url, defaults.server.base_url);
        assert_eq!(loaded.server.request_timeout_secs, defaults.server.request_timeout_secs);
        assert_eq!(loaded.polling.scan_interval_ms, defaults.polling.scan_interval_ms);
        assert_eq!(loaded.polling.results_interval_ms, defaults.polling.results_interval_ms);
        assert_eq!(loaded.flash.fade_ms, defaults.flash.fade_ms);
    }

    #[test]
    fn test_config_from_file() {
        let config_content = r#"
[server]
base_url = "https://mail.example.org"
session_cookie = "session=abc"

[polling]
scan_interval_ms = 2000
"#;
        let temp_file = write_temp_config(config_content);

        let config = config::load_file(temp_file.path()).unwrap();

        assert_eq!(config.server.base_url, "https://mail.example.org");
        assert_eq!(config.server.session_cookie.as_deref(), Some("session=abc"));
        assert_eq!(config.polling.scan_interval_ms, 2000);
        // Keys the file leaves out keep their defaults
        assert_eq!(config.polling.results_interval_ms, 5000);
        assert_eq!(config.server.request_timeout_secs, 600);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = config::load_file(&dir.path().join("absent.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_http_base_url() {
        let temp_file = write_temp_config("[server]\nbase_url = \"ftp://mail.example.org\"\n");
        let result = config::load_file(temp_file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must be http or https"));
    }

    #[test]
    fn test_unparsable_base_url() {
        let mut config = AppConfig::default();
        config.server.base_url = "not a url".to_string();
        let result = config::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid server.base_url"));
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let mut config = AppConfig::default();
        config.polling.scan_interval_ms = 0;
        let result = config::validate(&config);
        assert!(result.unwrap_err().to_string().contains("polling.scan_interval_ms must be > 0"));

        let mut config = AppConfig::default();
        config.polling.results_interval_ms = 0;
        let result = config::validate(&config);
        assert!(result.unwrap_err().to_string().contains("polling.results_interval_ms must be > 0"));

        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 0;
        assert!(config::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.flash.display_ms = 0;
        assert!(config::validate(&config).is_err());
    }

    #[test]
    fn test_long_pulse_only_warns() {
        let mut config = AppConfig::default();
        config.polling.label_pulse_ms = 10_000;
        assert!(config::validate(&config).is_ok());
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("MAILSIEVE__POLLING__RESULTS_INTERVAL_MS", "1500");

        let config = config::load().unwrap();

        assert_eq!(config.polling.results_interval_ms, 1500);
        assert_eq!(config.polling.results_interval(), std::time::Duration::from_millis(1500));

        env::remove_var("MAILSIEVE__POLLING__RESULTS_INTERVAL_MS");
    }
}
