use std::{
    env,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::RetryPolicy;

pub const CONFIG_PATH_VAR: &str = "MOODQUIZ_CONFIG";

pub const DEFAULT_CLASSIFIER_URL: &str =
    "https://api-inference.huggingface.co/models/motheecreator/vit-Facial-Expression-Recognition";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub port: u16,
    pub uploads_dir: PathBuf,
    pub database_path: PathBuf,
    pub classifier_url: String,
    pub classifier_token: Option<String>,
    pub classifier_timeout_secs: u64,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Upper bound for one multipart upload request body.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            uploads_dir: PathBuf::from("uploads"),
            database_path: PathBuf::from("moodquiz.sqlite3"),
            classifier_url: DEFAULT_CLASSIFIER_URL.to_string(),
            classifier_token: None,
            classifier_timeout_secs: 30,
            batch_size: 3,
            max_retries: 5,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads the optional JSON file named by `MOODQUIZ_CONFIG`, then applies
    /// environment overrides on top.
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                info!("{CONFIG_PATH_VAR} not set, using built-in defaults");
                Self::default()
            }
        };

        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config in {}", path.display()))
    }

    fn apply_env(&mut self) {
        override_from_env("MOODQUIZ_PORT", &mut self.port);
        override_from_env("MOODQUIZ_UPLOADS_DIR", &mut self.uploads_dir);
        override_from_env("MOODQUIZ_DB_PATH", &mut self.database_path);
        override_from_env("MOODQUIZ_CLASSIFIER_URL", &mut self.classifier_url);
        override_from_env("MOODQUIZ_BATCH_SIZE", &mut self.batch_size);
        override_from_env("MOODQUIZ_MAX_RETRIES", &mut self.max_retries);

        if let Ok(token) = env::var("HF_API_TOKEN") {
            let token = token.trim().to_string();
            if !token.is_empty() {
                self.classifier_token = Some(token);
            }
        }

        if self.batch_size == 0 {
            warn!("batch_size must be positive, falling back to 1");
            self.batch_size = 1;
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }
}

fn override_from_env<T>(key: &str, slot: &mut T)
where
    T: FromStr,
    T::Err: Display,
{
    let Ok(raw) = env::var(key) else {
        return;
    };

    match raw.trim().parse() {
        Ok(value) => {
            info!("{key} set from environment");
            *slot = value;
        }
        Err(err) => warn!("Invalid {key} value '{raw}': {err}, keeping current setting"),
    }
}
