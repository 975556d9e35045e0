use crate::domain::model::FlatRow;
use serde_json::{Map, Value};

pub const PATH_SEPARATOR: char = '.';

/// 將巢狀 JSON 物件遞迴攤平成點分路徑的單層紀錄。
///
/// 只有物件會被展開；陣列與純量原樣保留。空物件不產生任何欄位。
pub fn flatten_record(record: &Map<String, Value>) -> FlatRow {
    let mut row = FlatRow::new();
    flatten_into(&mut row, None, record);
    row
}

fn flatten_into(row: &mut FlatRow, prefix: Option<&str>, object: &Map<String, Value>) {
    for (key, value) in object {
        let path = match prefix {
            Some(parent) => format!("{}{}{}", parent, PATH_SEPARATOR, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => flatten_into(row, Some(&path), nested),
            other => {
                row.insert(path, other.clone());
            }
        }
    }
}
