use std::time::Duration;

/// Runtime settings, read once at startup. Every value has a default so
/// the server runs with no environment at all.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub upload_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(15 * 60),
            upload_dir: "uploads".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_origins);

        let rate_limit_max = std::env::var("RATE_LIMIT_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_max);

        let rate_limit_window = std::env::var("RATE_LIMIT_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);

        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir);

        Self {
            port,
            allowed_origins,
            rate_limit_max,
            rate_limit_window,
            upload_dir,
        }
    }
}
