use crate::config::settings::CollectorSettings;
use crate::core::columns::{canonicalize, reconcile_order_id};
use crate::core::flatten::flatten_record;
use crate::domain::model::{AccumulatedTable, CanonicalTable, FlatRow, PageResponse, TableTarget};
use crate::domain::ports::{Pipeline, TableSink};
use crate::utils::error::{CollectorError, Result};
use crate::utils::validation::Validate;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{Instrument, Span};

/// 建構收集器所需的輸入
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 頁碼會直接接在後面，例如 `https://api.example.com/responses?page=`
    pub base_url: String,
    pub token: String,
    pub target: TableTarget,
    pub settings: CollectorSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Uninitialized,
    CountFetched { total_pages: u64 },
    Paginating { page: u64, total_pages: u64 },
    Cleaned,
    Stored,
    Failed,
}

pub struct FeedbackCollector<S: TableSink> {
    config: CollectorConfig,
    sink: S,
    client: Client,
    span: Span,
    state: CollectorState,
    expected_count: Option<u64>,
    feedback: Option<CanonicalTable>,
}

impl<S: TableSink> FeedbackCollector<S> {
    pub fn new(config: CollectorConfig, sink: S) -> Result<Self> {
        config.settings.validate()?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token {}", config.token)).map_err(|_| {
            CollectorError::ValidationError {
                field: "token".to_string(),
                value: "***".to_string(),
                reason: "Token contains characters not allowed in an HTTP header".to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // rustls 預設即驗證憑證，這裡不提供關閉的選項
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.settings.request_timeout_seconds))
            .build()
            .map_err(|source| CollectorError::TransportError {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            config,
            sink,
            client,
            span: Span::none(),
            state: CollectorState::Uninitialized,
            expected_count: None,
            feedback: None,
        })
    }

    /// 由呼叫端提供的日誌 span，所有請求與寫入都在其中記錄
    pub fn with_log_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn target(&self) -> &TableTarget {
        &self.config.target
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 最近一次 `collect_feedback` 的結果
    pub fn feedback(&self) -> Option<&CanonicalTable> {
        self.feedback.as_ref()
    }

    pub fn page_url(&self, page_number: u64) -> String {
        format!("{}{}", self.config.base_url, page_number)
    }

    pub async fn fetch_page(&self, page_number: u64) -> Result<PageResponse> {
        let url = self.page_url(page_number);
        self.request_page(&url)
            .instrument(self.span.clone())
            .await
    }

    async fn request_page(&self, url: &str) -> Result<PageResponse> {
        let transport = |source| CollectorError::TransportError {
            url: url.to_string(),
            source,
        };

        tracing::debug!("📡 GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        tracing::debug!("📡 API response status: {}", status);
        if status != StatusCode::OK {
            return Err(CollectorError::ApiStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        parse_page(url, &body)
    }

    /// 只讀取第一頁的 `count`，以固定頁面大小推算總頁數
    pub async fn get_total_page_count(&mut self) -> Result<u64> {
        let first = self.fetch_page(1).await?;
        let page_size = self.config.settings.page_size;
        let total_pages = first.count.div_ceil(page_size);

        self.expected_count = Some(first.count);
        self.state = CollectorState::CountFetched { total_pages };
        self.span.in_scope(|| {
            tracing::info!(
                "🔢 API reports {} records -> {} pages of {}",
                first.count,
                total_pages,
                page_size
            );
        });
        Ok(total_pages)
    }

    /// 依序抓取所有頁面並累積成一張表 (尚未清理)
    pub async fn accumulate_pages(&mut self) -> Result<AccumulatedTable> {
        let result = self.try_accumulate_pages().await;
        if result.is_err() {
            self.state = CollectorState::Failed;
        }
        result
    }

    async fn try_accumulate_pages(&mut self) -> Result<AccumulatedTable> {
        let total_pages = self.get_total_page_count().await?;
        let mut table = AccumulatedTable::new();

        for page in 1..=total_pages {
            self.state = CollectorState::Paginating { page, total_pages };
            let response = self.fetch_page(page).await?;

            let mut rows: Vec<FlatRow> = response.results.iter().map(flatten_record).collect();
            reconcile_order_id(&mut rows);

            self.span.in_scope(|| {
                tracing::debug!("📥 Page {}/{}: {} records", page, total_pages, rows.len());
            });
            table.append_rows(rows);
        }

        if let Some(expected) = self.expected_count {
            if table.len() as u64 != expected {
                self.span.in_scope(|| {
                    tracing::warn!(
                        "⚠️ Accumulated {} records but the API reported {}",
                        table.len(),
                        expected
                    );
                });
            }
        }

        Ok(table)
    }

    /// 限制欄位、重新命名並清理評論；結果保留在收集器中
    pub fn canonicalize(&mut self, table: AccumulatedTable) -> CanonicalTable {
        let settings = &self.config.settings;
        let canonical = canonicalize(table, &settings.canonical_columns, settings.restrict_columns);

        self.span.in_scope(|| {
            tracing::info!(
                "🔄 Canonical table: {} rows, columns {:?}",
                canonical.len(),
                canonical.columns
            );
        });
        self.state = CollectorState::Cleaned;
        self.feedback = Some(canonical.clone());
        canonical
    }

    pub async fn collect_feedback(&mut self) -> Result<CanonicalTable> {
        let accumulated = self.accumulate_pages().await?;
        Ok(self.canonicalize(accumulated))
    }

    /// 整張取代目的資料表；失敗時不重試
    pub async fn store_feedback(&mut self, table: &CanonicalTable) -> Result<()> {
        let span = self.span.clone();
        let result = self
            .sink
            .replace_table(&self.config.target, table)
            .instrument(span)
            .await;

        match result {
            Ok(()) => {
                self.state = CollectorState::Stored;
                self.span.in_scope(|| {
                    tracing::info!("💾 Replaced {} with {} rows", self.config.target, table.len());
                });
                Ok(())
            }
            Err(e) => {
                self.state = CollectorState::Failed;
                Err(e)
            }
        }
    }
}

/// 檢查回應必須是含 `count` 與 `results` 的物件
fn parse_page(url: &str, body: &[u8]) -> Result<PageResponse> {
    let shape_error = |keys: Vec<String>, reason: String| CollectorError::ApiShapeError {
        url: url.to_string(),
        keys,
        reason,
    };

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| shape_error(Vec::new(), format!("body is not valid JSON: {}", e)))?;

    let Value::Object(mut object) = value else {
        return Err(shape_error(Vec::new(), "body is not a JSON object".to_string()));
    };
    let keys: Vec<String> = object.keys().cloned().collect();

    let missing: Vec<&str> = ["count", "results"]
        .into_iter()
        .filter(|k| !object.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Err(shape_error(keys, format!("missing {}", missing.join(" and "))));
    }

    let Some(count) = object.get("count").and_then(Value::as_u64) else {
        return Err(shape_error(keys, "`count` is not a non-negative integer".to_string()));
    };

    let results = match object.remove("results") {
        Some(Value::Array(items)) => items,
        _ => return Err(shape_error(keys, "`results` is not an array".to_string())),
    };

    let mut records = Vec::with_capacity(results.len());
    for (index, item) in results.into_iter().enumerate() {
        match item {
            Value::Object(record) => records.push(record),
            _ => {
                return Err(shape_error(keys, format!("results[{}] is not an object", index)));
            }
        }
    }

    Ok(PageResponse {
        count,
        results: records,
    })
}

#[async_trait::async_trait]
impl<S: TableSink> Pipeline for FeedbackCollector<S> {
    async fn extract(&mut self) -> Result<AccumulatedTable> {
        self.accumulate_pages().await
    }

    async fn transform(&mut self, data: AccumulatedTable) -> Result<CanonicalTable> {
        Ok(self.canonicalize(data))
    }

    async fn load(&mut self, table: CanonicalTable) -> Result<String> {
        self.store_feedback(&table).await?;
        Ok(self.config.target.to_string())
    }
}
