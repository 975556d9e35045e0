use crate::config::settings::CollectorSettings;
use crate::core::collector::CollectorConfig;
use crate::domain::model::TableTarget;
use crate::utils::error::{CollectorError, Result};
use crate::utils::validation::{self, Validate};
use clap::Parser;
use std::path::PathBuf;

#[derive(Clone, Parser)]
#[command(name = "feedback-collector")]
#[command(about = "Pull survey feedback from the API and replace an analytics table with it")]
pub struct CliConfig {
    /// Survey API token, sent as `Authorization: Token <token>`
    #[arg(long, env = "FEEDBACK_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Destination schema
    #[arg(long, env = "DOCKER_ML_OUTPUT_SCHEMA")]
    pub schema: String,

    /// Destination table (replaced on every run)
    #[arg(long)]
    pub table: String,

    /// Paginated endpoint; the page number is appended to it
    #[arg(long, env = "FEEDBACK_API_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "GOSPEL_DB_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Optional TOML file with collector settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Only request the record count and report the page plan")]
    pub dry_run: bool,
}

impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field("token", &"***")
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("base_url", &self.base_url)
            .field("database_url", &self.database_url.as_ref().map(|_| "***"))
            .field("config", &self.config)
            .field("verbose", &self.verbose)
            .field("json_logs", &self.json_logs)
            .field("monitor", &self.monitor)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CliConfig {
    /// 載入 TOML 設定 (若有指定)；未指定時使用預設值
    pub fn load_settings(&self) -> Result<CollectorSettings> {
        let settings = match &self.config {
            Some(path) => CollectorSettings::from_file(path)?,
            None => CollectorSettings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// 設定檔中的 base_url 優先於命令列
    pub fn collector_config(&self, settings: CollectorSettings) -> Result<CollectorConfig> {
        let base_url = settings
            .base_url
            .clone()
            .or_else(|| self.base_url.clone())
            .ok_or_else(|| CollectorError::ConfigError {
                message: "No API base URL: pass --base-url, set FEEDBACK_API_BASE_URL or set base_url in the config file".to_string(),
            })?;
        validation::validate_page_suffix("base_url", &base_url)?;

        Ok(CollectorConfig {
            base_url,
            token: self.token.clone(),
            target: TableTarget::new(self.schema.clone(), self.table.clone()),
            settings,
        })
    }

    pub fn database_url(&self) -> Result<&str> {
        validation::validate_required_field("GOSPEL_DB_URL", &self.database_url).map(String::as_str)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("token", &self.token)?;
        validation::validate_identifier("schema", &self.schema)?;
        validation::validate_identifier("table", &self.table)?;
        if let Some(base_url) = &self.base_url {
            validation::validate_page_suffix("base_url", base_url)?;
        }
        Ok(())
    }
}
