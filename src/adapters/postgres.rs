use crate::domain::model::{CanonicalTable, TableTarget};
use crate::domain::ports::TableSink;
use crate::utils::error::{CollectorError, Result};
use serde_json::Value;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};

/// PostgreSQL 單一語句的綁定參數上限
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Text,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
        }
    }

    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(n) if n.as_i64().is_some() => Some(ColumnType::BigInt),
            Value::Number(_) => Some(ColumnType::Double),
            Value::String(_) | Value::Array(_) | Value::Object(_) => Some(ColumnType::Text),
        }
    }

    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::BigInt, ColumnType::Double) | (ColumnType::Double, ColumnType::BigInt) => {
                ColumnType::Double
            }
            _ => ColumnType::Text,
        }
    }
}

/// 依欄位中的非 null 值推斷型別；全為 null 時視為 TEXT
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> ColumnType {
    values
        .into_iter()
        .flatten()
        .filter_map(ColumnType::of)
        .reduce(ColumnType::widen)
        .unwrap_or(ColumnType::Text)
}

pub fn table_schema(table: &CanonicalTable) -> Vec<(String, ColumnType)> {
    table
        .columns
        .iter()
        .map(|column| {
            let ty = infer_column_type(table.rows.iter().map(|row| row.get(column)));
            (column.clone(), ty)
        })
        .collect()
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn qualified(target: &TableTarget) -> String {
    format!("{}.{}", quote_ident(&target.schema), quote_ident(&target.table))
}

pub fn drop_table_sql(target: &TableTarget) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified(target))
}

pub fn create_table_sql(target: &TableTarget, columns: &[(String, ColumnType)]) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql()))
        .collect();
    format!("CREATE TABLE {} ({})", qualified(target), definitions.join(", "))
}

fn insert_prefix(target: &TableTarget, columns: &[(String, ColumnType)]) -> String {
    let names: Vec<String> = columns.iter().map(|(name, _)| quote_ident(name)).collect();
    format!("INSERT INTO {} ({}) ", qualified(target), names.join(", "))
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Bool(Option<bool>),
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
}

/// 缺少的欄位與 null 都寫成對應型別的 NULL
pub fn bind_value(value: Option<&Value>, ty: ColumnType) -> BindValue {
    let value = value.filter(|v| !v.is_null());
    match ty {
        ColumnType::Boolean => BindValue::Bool(value.and_then(Value::as_bool)),
        ColumnType::BigInt => BindValue::Int(value.and_then(Value::as_i64)),
        ColumnType::Double => BindValue::Float(value.and_then(Value::as_f64)),
        ColumnType::Text => BindValue::Text(value.map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
    }
}

/// 以 drop-and-recreate 方式寫入 PostgreSQL。
///
/// 連線只在寫入前建立，不論成功與否都會關閉。
#[derive(Clone)]
pub struct PgSink {
    database_url: String,
}

impl std::fmt::Debug for PgSink {
    // DSN 可能含有密碼，不輸出
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSink").finish_non_exhaustive()
    }
}

impl PgSink {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

async fn write_replacing(
    conn: &mut PgConnection,
    target: &TableTarget,
    table: &CanonicalTable,
) -> std::result::Result<(), sqlx::Error> {
    let columns = table_schema(table);
    let mut tx = conn.begin().await?;

    sqlx::query(&drop_table_sql(target)).execute(&mut *tx).await?;
    sqlx::query(&create_table_sql(target, &columns))
        .execute(&mut *tx)
        .await?;

    if !columns.is_empty() && !table.rows.is_empty() {
        let batch_rows = (MAX_BIND_PARAMS / columns.len()).max(1);
        for chunk in table.rows.chunks(batch_rows) {
            let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(insert_prefix(target, &columns));
            qb.push_values(chunk, |mut b, row| {
                for (name, ty) in &columns {
                    match bind_value(row.get(name), *ty) {
                        BindValue::Bool(v) => {
                            b.push_bind(v);
                        }
                        BindValue::Int(v) => {
                            b.push_bind(v);
                        }
                        BindValue::Float(v) => {
                            b.push_bind(v);
                        }
                        BindValue::Text(v) => {
                            b.push_bind(v);
                        }
                    }
                }
            });
            qb.build().execute(&mut *tx).await?;
            tracing::debug!("💾 Inserted batch of {} rows into {}", chunk.len(), target);
        }
    }

    tx.commit().await
}

impl TableSink for PgSink {
    async fn replace_table(&self, target: &TableTarget, table: &CanonicalTable) -> Result<()> {
        let storage_error = |source| CollectorError::StorageError {
            target: target.to_string(),
            source,
        };

        let mut conn = PgConnection::connect(&self.database_url)
            .await
            .map_err(storage_error)?;
        tracing::debug!("💾 Connected; replacing {}", target);

        let written = write_replacing(&mut conn, target, table).await;
        if let Err(e) = conn.close().await {
            tracing::warn!("⚠️ Closing the database connection failed: {}", e);
        }

        written.map_err(storage_error)
    }
}
