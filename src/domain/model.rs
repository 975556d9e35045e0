use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 一筆攤平後的紀錄：`contact.attributes.order id` 這類點分路徑 -> 純量值
pub type FlatRow = IndexMap<String, Value>;

/// 調查 API 單頁回應 `{count, results}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse {
    pub count: u64,
    pub results: Vec<serde_json::Map<String, Value>>,
}

/// 跨頁累積的結果。欄位集合為所有已處理頁面的聯集，依首次出現順序排列。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedTable {
    columns: IndexSet<String>,
    rows: Vec<FlatRow>,
}

impl AccumulatedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_rows(&mut self, rows: Vec<FlatRow>) {
        for row in &rows {
            for key in row.keys() {
                if !self.columns.contains(key) {
                    self.columns.insert(key.clone());
                }
            }
        }
        self.rows.extend(rows);
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<FlatRow>) {
        (self.columns.into_iter().collect(), self.rows)
    }
}

/// 清理完成、可寫入目的資料表的結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalTable {
    pub columns: Vec<String>,
    pub rows: Vec<FlatRow>,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 取得某列某欄的值；缺少的欄位視為 null
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTarget {
    pub schema: String,
    pub table: String,
}

impl TableTarget {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> FlatRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let mut table = AccumulatedTable::new();
        table.append_rows(vec![row(&[("score", json!(9)), ("comment", json!("ok"))])]);
        table.append_rows(vec![
            row(&[("campaign", json!("c1"))]),
            row(&[("score", json!(3)), ("posted_date", json!("2024-01-01"))]),
        ]);

        let columns: Vec<&str> = table.columns().collect();
        assert_eq!(columns, vec!["score", "comment", "campaign", "posted_date"]);
        assert_eq!(table.len(), 3);
        // 缺少的欄位保持缺少，不補值
        assert!(table.rows()[1].get("score").is_none());
    }

    #[test]
    fn test_table_target_display() {
        let target = TableTarget::new("ml_output", "customer_feedback");
        assert_eq!(target.to_string(), "ml_output.customer_feedback");
    }
}
