use crate::core::sanitize::sanitize_comment_value;
use crate::domain::model::{AccumulatedTable, CanonicalTable, FlatRow};
use indexmap::IndexMap;
use serde_json::Value;

/// API 回應中訂單編號欄位的大小寫並不一致，兩種寫法都會出現
pub const ORDER_ID_TITLE_CASE: &str = "contact.attributes.Order Id";
pub const ORDER_ID_LOWER_CASE: &str = "contact.attributes.order id";
pub const ORDER_ID_COLUMN: &str = "order_id";
pub const COMMENT_COLUMN: &str = "comment";
pub const ATTRIBUTES_PREFIX: &str = "contact_attributes_";

/// 在單頁的資料列上合併兩種訂單編號欄位成 `order_id`。
///
/// 欄位是否存在以整頁為單位判斷：只要頁內任一列帶有該欄位，整頁每一列都會得到
/// `order_id` (缺值為 null)。兩種寫法都不存在時不新增欄位。
pub fn reconcile_order_id(rows: &mut [FlatRow]) {
    let has_title = rows.iter().any(|r| r.contains_key(ORDER_ID_TITLE_CASE));
    let has_lower = rows.iter().any(|r| r.contains_key(ORDER_ID_LOWER_CASE));

    if !has_title && !has_lower {
        return;
    }

    for row in rows.iter_mut() {
        let title = row
            .shift_remove(ORDER_ID_TITLE_CASE)
            .filter(|v| !v.is_null());
        let lower = row.shift_remove(ORDER_ID_LOWER_CASE);
        let order_id = title.or(lower).unwrap_or(Value::Null);
        row.insert(ORDER_ID_COLUMN.to_string(), order_id);
    }
}

/// `Contact.Attributes.Score Type` -> `score_type`
pub fn clean_column_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '.' || c == ' ' { '_' } else { c })
        .collect::<String>()
        .to_lowercase();

    match cleaned.strip_prefix(ATTRIBUTES_PREFIX) {
        Some(rest) => rest.to_string(),
        None => cleaned,
    }
}

/// 將累積結果轉為最終資料表：限制欄位、重新命名、清理評論。
///
/// 欄位是否屬於標準欄位以清理後的名稱比對，輸出順序依 `canonical_columns`。
/// `restrict` 為 false 時保留所有欄位並維持首次出現順序。
/// 多個原始欄位清理後同名時，同一列中較晚出現的原始欄位覆蓋較早的值。
pub fn canonicalize(
    table: AccumulatedTable,
    canonical_columns: &[String],
    restrict: bool,
) -> CanonicalTable {
    let (raw_columns, rows) = table.into_parts();

    let mut sources: IndexMap<String, Vec<String>> = IndexMap::new();
    for raw in raw_columns {
        let cleaned = clean_column_name(&raw);
        if restrict && !canonical_columns.contains(&cleaned) {
            tracing::trace!("Dropping non-canonical column '{}'", raw);
            continue;
        }
        sources.entry(cleaned).or_default().push(raw);
    }

    if restrict {
        sources.sort_by_cached_key(|cleaned, _| {
            canonical_columns
                .iter()
                .position(|c| c == cleaned)
                .unwrap_or(usize::MAX)
        });
    }

    for (cleaned, raws) in sources.iter().filter(|(_, raws)| raws.len() > 1) {
        tracing::warn!(
            "Columns {:?} all clean to '{}'; the last one present in each row wins",
            raws,
            cleaned
        );
    }

    let rows = rows
        .into_iter()
        .map(|row| {
            let mut out = FlatRow::with_capacity(sources.len());
            for (cleaned, raws) in &sources {
                for raw in raws {
                    if let Some(value) = row.get(raw) {
                        out.insert(cleaned.clone(), value.clone());
                    }
                }
            }
            if let Some(comment) = out.get_mut(COMMENT_COLUMN) {
                sanitize_comment_value(comment);
            }
            out
        })
        .collect();

    CanonicalTable {
        columns: sources.into_keys().collect(),
        rows,
    }
}
