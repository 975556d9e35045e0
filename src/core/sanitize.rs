use serde_json::Value;

/// 清理評論文字：先移除內嵌的 NUL，再將每個非 ASCII 字元 (code point >= 128) 換成一個空白。
///
/// 目的資料庫的 TEXT 欄位不接受 NUL，下游報表也只處理 ASCII。
pub fn sanitize_comment(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\0')
        .map(|c| if c.is_ascii() { c } else { ' ' })
        .collect()
}

/// null 與非字串值保持原樣
pub fn sanitize_comment_value(value: &mut Value) {
    if let Value::String(text) = value {
        *text = sanitize_comment(text);
    }
}
