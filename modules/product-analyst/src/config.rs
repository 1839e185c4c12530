use anyhow::{Context, Result};

/// Secrets and environment-specific values. Everything else lives in the
/// TOML [`FileConfig`](crate::file_config::FileConfig).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bright_data_api_key: String,
    pub deepseek_api_key: String,
    /// Overrides `[llm] base_url` when set.
    pub llm_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            bright_data_api_key: required("BRIGHT_DATA_API_KEY")?,
            deepseek_api_key: required("DEEPSEEK_API_KEY")?,
            llm_base_url: std::env::var("LLM_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  BRIGHT_DATA_API_KEY: {}", preview(&self.bright_data_api_key));
        tracing::info!("  DEEPSEEK_API_KEY: {}", preview(&self.deepseek_api_key));
        tracing::info!(
            "  LLM_BASE_URL: {}",
            self.llm_base_url.as_deref().unwrap_or("<not set>")
        );
    }
}

fn required(name: &str) -> Result<String> {
    let value = std::env::var(name).with_context(|| format!("{name} must be set"))?;
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(value)
}
