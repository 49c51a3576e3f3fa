//! Display SQL with bind values inlined, for logs and previews

use twoway_core::Value;

/// Quote a string for SQL
pub fn sqlquote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// SQL literal text for a bind value
pub fn literal(value: &Value) -> String {
    match value {
        Value::String(_) | Value::Date(_) | Value::DateTime(_) | Value::Time(_) => {
            sqlquote(&value.to_string())
        }
        other => other.to_string(),
    }
}

/// Replace each `?` outside single-quoted literals with the next value.
///
/// Extra placeholders are left as they are.
pub fn display_sql(sql: &str, values: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut values = values.iter();
    let mut in_literal = false;
    let mut in_line_comment = false;

    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_line_comment {
            in_line_comment = ch != '\n';
            out.push(ch);
            continue;
        }
        match ch {
            '-' if !in_literal && chars.peek() == Some(&'-') => {
                in_line_comment = true;
                out.push(ch);
            }
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => match values.next() {
                Some(value) => out.push_str(&literal(value)),
                None => out.push(ch),
            },
            _ => out.push(ch),
        }
    }
    out
}
