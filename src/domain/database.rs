//! PostgreSQL 执行相关领域模型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// psql 非对齐输出的字段分隔符
pub const FIELD_SEPARATOR: &str = "\u{1f}";
/// psql 非对齐输出的记录分隔符
pub const RECORD_SEPARATOR: &str = "\u{1e}";
/// psql 输出中代表 SQL NULL 的标记
pub const NULL_MARKER: &str = "\u{1d}";

/// 执行 SQL 请求
#[derive(Debug, Default, Deserialize)]
pub struct SqlExecuteRequest {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

/// SELECT 响应
#[derive(Debug, Serialize)]
pub struct SqlSelectResponse {
    pub success: bool,
    pub data: Vec<Map<String, Value>>,
    pub columns: Vec<String>,
    pub row_count: usize,
}

/// 非 SELECT 语句响应
#[derive(Debug, Serialize)]
pub struct SqlCommandResponse {
    pub success: bool,
    pub message: String,
    pub rows_affected: i64,
}

/// 执行结果
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SqlExecuteResponse {
    Rows(SqlSelectResponse),
    Command(SqlCommandResponse),
}

/// 是否为 SELECT 语句（去除首尾空白后不区分大小写）
pub fn is_select_statement(query: &str) -> bool {
    query
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
}

/// 解析 psql 非对齐输出：首条记录为列名，其余为数据行
pub fn parse_unaligned_rows(output: &str) -> (Vec<String>, Vec<Map<String, Value>>) {
    let body = output.strip_suffix('\n').unwrap_or(output);
    if body.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut records = body.split(RECORD_SEPARATOR);
    let columns: Vec<String> = records
        .next()
        .map(|header| header.split(FIELD_SEPARATOR).map(str::to_string).collect())
        .unwrap_or_default();

    let rows = records
        .map(|record| {
            columns
                .iter()
                .cloned()
                .zip(record.split(FIELD_SEPARATOR))
                .map(|(column, value)| {
                    let value = if value == NULL_MARKER {
                        Value::Null
                    } else {
                        Value::String(value.to_string())
                    };
                    (column, value)
                })
                .collect()
        })
        .collect();

    (columns, rows)
}

/// 从命令标签（如 `UPDATE 3`、`INSERT 0 1`）中解析受影响行数
pub fn parse_affected_rows(output: &str) -> i64 {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|tag| tag.split_whitespace().last())
        .and_then(|count| count.parse().ok())
        .unwrap_or(0)
}
