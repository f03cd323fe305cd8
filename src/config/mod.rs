use std::path::PathBuf;

use serde::Deserialize;

use crate::services::ai_provider::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    R2,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Public base URL used to build links to static artifacts. Required.
    pub backend_public_url: String,

    /// PostgreSQL connection string. Required.
    pub database_url: String,

    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Comma-separated CORS origins, or "*"
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,

    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    #[serde(default = "default_renders_subdir")]
    pub renders_subdir: String,

    #[serde(default = "default_uploads_subdir")]
    pub uploads_subdir: String,

    #[serde(default = "default_models_subdir")]
    pub models_subdir: String,

    #[serde(default = "default_upload_max_mb")]
    pub upload_max_mb: usize,

    #[serde(default = "default_ai_provider")]
    pub ai_provider: ProviderKind,

    /// xAI API key, required when `ai_provider` is grok
    #[serde(default)]
    pub grok_api_key: String,

    #[serde(default = "default_grok_model")]
    pub grok_model: String,

    #[serde(default = "default_grok_base_url")]
    pub grok_base_url: String,

    /// Simulated render latency of the fake provider
    #[serde(default = "default_render_delay_ms")]
    pub render_delay_ms: u64,

    /// Capacity of the per-stream procurement event channel
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,

    /// R2 bucket name
    pub r2_bucket: Option<String>,

    /// R2 endpoint URL
    pub r2_endpoint: Option<String>,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: Option<String>,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: Option<String>,

    /// Public URL in front of the R2 bucket
    pub r2_public_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_allowed_origins() -> String {
    "*".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_renders_subdir() -> String {
    "renders".to_string()
}

fn default_uploads_subdir() -> String {
    "uploads".to_string()
}

fn default_models_subdir() -> String {
    "models".to_string()
}

fn default_upload_max_mb() -> usize {
    10
}

fn default_ai_provider() -> ProviderKind {
    ProviderKind::Fake
}

fn default_grok_model() -> String {
    "grok-3".to_string()
}

fn default_grok_base_url() -> String {
    "https://api.x.ai/v1".to_string()
}

fn default_render_delay_ms() -> u64 {
    3000
}

fn default_stream_buffer() -> usize {
    16
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Local
}

/// R2 settings, present only when every value is configured.
pub struct R2Settings<'a> {
    pub bucket: &'a str,
    pub endpoint: &'a str,
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub public_url: &'a str,
}

const REDACTED: &str = "[REDACTED]";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Build from explicit `(NAME, value)` pairs instead of the process
    /// environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(pairs)?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that must fail at startup rather than at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_public_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "BACKEND_PUBLIC_URL must not be empty".to_string(),
            ));
        }
        if self.ai_provider == ProviderKind::Grok && self.grok_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "AI_PROVIDER=grok requires GROK_API_KEY to be set".to_string(),
            ));
        }
        if self.storage_backend == StorageBackend::R2 && self.r2_settings().is_none() {
            return Err(ConfigError::Invalid(
                "STORAGE_BACKEND=r2 requires R2_BUCKET, R2_ENDPOINT, R2_ACCESS_KEY, \
                 R2_SECRET_KEY and R2_PUBLIC_URL"
                    .to_string(),
            ));
        }
        if self.upload_max_mb == 0 {
            return Err(ConfigError::Invalid(
                "UPLOAD_MAX_MB must be greater than zero".to_string(),
            ));
        }
        if self.stream_buffer == 0 {
            return Err(ConfigError::Invalid(
                "STREAM_BUFFER must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn renders_dir(&self) -> PathBuf {
        self.static_dir.join(&self.renders_subdir)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.static_dir.join(&self.uploads_subdir)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.static_dir.join(&self.models_subdir)
    }

    /// Public URL prefix of a static subdirectory.
    pub fn static_url(&self, subdir: &str) -> String {
        format!(
            "{}/static/{}",
            self.backend_public_url.trim_end_matches('/'),
            subdir
        )
    }

    pub fn upload_max_bytes(&self) -> usize {
        self.upload_max_mb * 1024 * 1024
    }

    pub fn cors_origins(&self) -> Vec<String> {
        let origins = self.allowed_origins.trim();
        if origins == "*" {
            return vec!["*".to_string()];
        }
        origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn r2_settings(&self) -> Option<R2Settings<'_>> {
        Some(R2Settings {
            bucket: self.r2_bucket.as_deref()?,
            endpoint: self.r2_endpoint.as_deref()?,
            access_key: self.r2_access_key.as_deref()?,
            secret_key: self.r2_secret_key.as_deref()?,
            public_url: self.r2_public_url.as_deref()?,
        })
    }

    /// Loggable view of the configuration with secrets redacted.
    pub fn safe_summary(&self) -> serde_json::Value {
        let redact = |value: &str| if value.is_empty() { "" } else { REDACTED };
        serde_json::json!({
            "bind_addr": self.bind_addr,
            "backend_public_url": self.backend_public_url,
            "database_url": REDACTED,
            "log_level": self.log_level,
            "allowed_origins": self.allowed_origins,
            "static_dir": self.static_dir,
            "upload_max_mb": self.upload_max_mb,
            "ai_provider": self.ai_provider.to_string(),
            "grok_api_key": redact(&self.grok_api_key),
            "grok_model": self.grok_model,
            "storage_backend": format!("{:?}", self.storage_backend).to_lowercase(),
            "r2_bucket": self.r2_bucket,
            "r2_secret_key": self.r2_secret_key.as_deref().map(redact),
            "stream_buffer": self.stream_buffer,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut all = vec![
            ("BACKEND_PUBLIC_URL", "http://localhost:8000"),
            ("DATABASE_URL", "postgres://localhost/spaceforge"),
        ];
        all.extend_from_slice(extra);
        all.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_pairs(pairs(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.ai_provider, ProviderKind::Fake);
        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.renders_dir(), PathBuf::from("static/renders"));
        assert_eq!(config.upload_max_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.cors_origins(), vec!["*"]);
        assert_eq!(
            config.static_url("renders"),
            "http://localhost:8000/static/renders"
        );
    }

    #[test]
    fn test_missing_public_url_fails() {
        let err = AppConfig::from_pairs(vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/db".to_string(),
        )])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn test_grok_requires_key() {
        let err = AppConfig::from_pairs(pairs(&[("AI_PROVIDER", "grok")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let ok = AppConfig::from_pairs(pairs(&[("AI_PROVIDER", "grok"), ("GROK_API_KEY", "xai-1")]));
        assert_eq!(ok.unwrap().ai_provider, ProviderKind::Grok);
    }

    #[test]
    fn test_r2_requires_all_settings() {
        let err = AppConfig::from_pairs(pairs(&[
            ("STORAGE_BACKEND", "r2"),
            ("R2_BUCKET", "renders"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_cors_origins_split() {
        let config = AppConfig::from_pairs(pairs(&[(
            "ALLOWED_ORIGINS",
            " https://a.example , https://b.example,, ",
        )]))
        .unwrap();
        assert_eq!(
            config.cors_origins(),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_safe_summary_redacts_secrets() {
        let config = AppConfig::from_pairs(pairs(&[
            ("AI_PROVIDER", "grok"),
            ("GROK_API_KEY", "xai-secret"),
        ]))
        .unwrap();
        let summary = config.safe_summary().to_string();
        assert!(!summary.contains("xai-secret"));
        assert!(!summary.contains("postgres://"));
        assert!(summary.contains(REDACTED));
    }
}
