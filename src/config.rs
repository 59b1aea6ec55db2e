use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::views::HistoryMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub service_host: String,
    pub service_port: u16,
    pub files_dir: PathBuf,
    pub log_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub cors_allowed_origin: String,
    pub app_base_url: String,
    pub app_history_mode: HistoryMode,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_embedding_model: String,
    pub hf_api_token: Option<String>,
    pub hf_inference_url: String,
    pub hf_embedding_model: String,
    pub embedding_timeout_secs: u64,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let service_host = var_or("SERVICE_HOST", "0.0.0.0");

        let service_port = var_or("SERVICE_PORT", "5000")
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let files_dir = PathBuf::from(var_or("FILES_DIR", "files"));
        let log_dir = PathBuf::from(var_or("LOG_DIR", "log"));

        let max_upload_bytes = var_or("MAX_UPLOAD_BYTES", "16777216")
            .parse::<usize>()
            .context("MAX_UPLOAD_BYTES must be a positive integer")?;

        let cors_allowed_origin = var_or("CORS_ALLOWED_ORIGIN", "*");

        let app_base_url = var_or("APP_BASE_URL", "/");
        if !app_base_url.starts_with('/') {
            bail!("APP_BASE_URL must start with '/', got '{}'", app_base_url);
        }

        let app_history_mode = var_or("APP_HISTORY_MODE", "web")
            .parse::<HistoryMode>()
            .context("APP_HISTORY_MODE must be one of: web, hash")?;

        let openai_api_key = optional_var("OPENAI_API_KEY");
        let openai_base_url = var_or("OPENAI_BASE_URL", "https://api.openai.com");
        let openai_embedding_model = var_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small");

        let hf_api_token = optional_var("HF_API_TOKEN");
        let hf_inference_url = var_or("HF_INFERENCE_URL", "https://api-inference.huggingface.co");
        let hf_embedding_model = var_or("HF_EMBEDDING_MODEL", "BAAI/bge-small-zh-v1.5");

        let embedding_timeout_secs = var_or("EMBEDDING_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .context("EMBEDDING_TIMEOUT_SECS must be a number of seconds")?;

        Ok(Config {
            service_host,
            service_port,
            files_dir,
            log_dir,
            max_upload_bytes,
            cors_allowed_origin,
            app_base_url,
            app_history_mode,
            openai_api_key,
            openai_base_url,
            openai_embedding_model,
            hf_api_token,
            hf_inference_url,
            hf_embedding_model,
            embedding_timeout_secs,
        })
    }

    pub fn log_startup(&self) {
        let secret = |v: &Option<String>| if v.is_some() { "set" } else { "not set" };

        tracing::info!("Configuration loaded:");
        tracing::info!("  Files directory: {}", self.files_dir.display());
        tracing::info!("  Log directory: {}", self.log_dir.display());
        tracing::info!("  Max upload size: {} bytes", self.max_upload_bytes);
        tracing::info!("  CORS allowed origin: {}", self.cors_allowed_origin);
        tracing::info!(
            "  App base URL: {} ({} history)",
            self.app_base_url,
            self.app_history_mode
        );
        tracing::info!(
            "  HuggingFace model: {} via {}",
            self.hf_embedding_model,
            self.hf_inference_url
        );
        tracing::info!("  HuggingFace token: {}", secret(&self.hf_api_token));
        tracing::info!(
            "  OpenAI model: {} via {}",
            self.openai_embedding_model,
            self.openai_base_url
        );
        tracing::info!("  OpenAI API key: {}", secret(&self.openai_api_key));
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}

#[cfg(test)]
impl Config {
    /// Configuration rooted in a scratch directory, no remote credentials.
    pub fn for_tests(root: &std::path::Path) -> Self {
        Config {
            service_host: "127.0.0.1".to_string(),
            service_port: 0,
            files_dir: root.join("files"),
            log_dir: root.join("log"),
            max_upload_bytes: 1024 * 1024,
            cors_allowed_origin: "*".to_string(),
            app_base_url: "/".to_string(),
            app_history_mode: HistoryMode::Web,
            openai_api_key: None,
            openai_base_url: "http://127.0.0.1:9".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            hf_api_token: None,
            hf_inference_url: "http://127.0.0.1:9".to_string(),
            hf_embedding_model: "BAAI/bge-small-zh-v1.5".to_string(),
            embedding_timeout_secs: 1,
        }
    }
}
