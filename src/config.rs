use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Raw `Cookie` header value of an already authenticated session, e.g.
    /// `session=...`. Logging in is handled by the server's own pages.
    pub session_cookie: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub scan_interval_ms: u64,
    pub results_interval_ms: u64,
    pub label_pulse_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlashConfig {
    pub display_ms: u64,
    pub fade_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub flash: FlashConfig,
}

impl PollingConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn results_interval(&self) -> Duration {
        Duration::from_millis(self.results_interval_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        // Mirror defaults from config/default.toml
        Self {
            scan_interval_ms: 5000,
            results_interval_ms: 5000,
            label_pulse_ms: 500,
        }
    }
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            display_ms: 5000,
            fade_ms: 800,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: "http://127.0.0.1:5000".to_string(),
                request_timeout_secs: 600,
                session_cookie: None,
            },
            polling: PollingConfig::default(),
            flash: FlashConfig::default(),
        }
    }
}

fn defaults_builder() -> ::config::ConfigBuilder<::config::builder::DefaultState> {
    ::config::Config::builder().add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
}

/// Loads the configuration: embedded defaults -> mailsieve.toml -> MAILSIEVE_CONFIG -> env/.env.
pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = defaults_builder()
        // Optional local file: mailsieve.toml (in CWD)
        .add_source(::config::File::with_name("mailsieve").required(false));

    if let Ok(custom_path) = std::env::var("MAILSIEVE_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("MAILSIEVE").separator("__"));

    let app_cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Embedded defaults overlaid with a single explicit file, no environment.
pub fn load_file(path: &Path) -> anyhow::Result<AppConfig> {
    let app_cfg: AppConfig = defaults_builder()
        .add_source(::config::File::from(path).required(true))
        .build()?
        .try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    let base = url::Url::parse(&cfg.server.base_url)
        .map_err(|e| anyhow::anyhow!("invalid server.base_url {}: {}", cfg.server.base_url, e))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(anyhow::anyhow!("server.base_url must be http or https, got {}", base.scheme()));
    }
    if cfg.server.request_timeout_secs == 0 {
        return Err(anyhow::anyhow!("server.request_timeout_secs must be > 0"));
    }

    if cfg.polling.scan_interval_ms == 0 {
        return Err(anyhow::anyhow!("polling.scan_interval_ms must be > 0"));
    }
    if cfg.polling.results_interval_ms == 0 {
        return Err(anyhow::anyhow!("polling.results_interval_ms must be > 0"));
    }
    if cfg.polling.label_pulse_ms >= cfg.polling.scan_interval_ms.min(cfg.polling.results_interval_ms) {
        tracing::warn!(
            "polling.label_pulse_ms ({}) outlasts a poll interval; the label will look permanently lit",
            cfg.polling.label_pulse_ms
        );
    }

    if cfg.flash.display_ms == 0 {
        return Err(anyhow::anyhow!("flash.display_ms must be > 0"));
    }

    Ok(())
}
