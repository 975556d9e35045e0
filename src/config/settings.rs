use crate::utils::error::{CollectorError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 調查 API 每頁固定回傳 100 筆；這是 API 合約，不從回應推算
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// 下游報表依賴的欄位 (清理後名稱)
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "order_id",
    "order_number",
    "contact_email",
    "score",
    "score_type",
    "posted_date",
    "comment",
    "campaign",
];

pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;

pub fn default_canonical_columns() -> Vec<String> {
    CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect()
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_restrict_columns() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

/// 收集器的可覆寫設定，可由 TOML 檔載入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorSettings {
    /// 覆寫 `--base-url`
    pub base_url: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_canonical_columns")]
    pub canonical_columns: Vec<String>,
    #[serde(default = "default_restrict_columns")]
    pub restrict_columns: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            canonical_columns: default_canonical_columns(),
            restrict_columns: true,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl CollectorSettings {
    /// 從 TOML 檔案載入設定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| CollectorError::ConfigError {
                message: format!("Cannot read {}: {}", path.display(), e),
            })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析設定
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| CollectorError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${FEEDBACK_API_BASE_URL})；未設定的變數保留原文
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CollectorError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for CollectorSettings {
    fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            validation::validate_page_suffix("base_url", base_url)?;
        }
        validation::validate_positive_number("page_size", self.page_size as usize, 1)?;
        validation::validate_range("request_timeout_seconds", self.request_timeout_seconds, 1, 3600)?;

        if self.restrict_columns && self.canonical_columns.is_empty() {
            return Err(CollectorError::ValidationError {
                field: "canonical_columns".to_string(),
                value: "[]".to_string(),
                reason: "Column restriction is enabled but no canonical columns are listed"
                    .to_string(),
            });
        }
        for column in &self.canonical_columns {
            validation::validate_identifier("canonical_columns", column)?;
        }
        Ok(())
    }
}
