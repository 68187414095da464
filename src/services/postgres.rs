//! PostgreSQL SQL 透传
//!
//! 通过 psql 执行任意 SQL：SELECT 返回行，其余语句返回受影响行数

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::panel::DatabaseSection;
use crate::domain::container::is_valid_identifier;
use crate::domain::database::{
    is_select_statement, parse_affected_rows, parse_unaligned_rows, SqlCommandResponse,
    SqlExecuteResponse, SqlSelectResponse, FIELD_SEPARATOR, NULL_MARKER, RECORD_SEPARATOR,
};
use crate::infra::CommandExecutor;

/// SQL 执行错误
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("{0}")]
    Validation(String),

    /// 未配置连接参数
    #[error("{0}")]
    NotConfigured(String),

    #[error("{message}")]
    Execution {
        message: String,
        exit_code: i32,
        stderr: String,
    },
}

/// psql 执行器
pub struct PostgresRunner {
    executor: Arc<dyn CommandExecutor>,
    psql_bin: String,
    timeout: Duration,
    connection: DatabaseSection,
}

impl PostgresRunner {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        psql_bin: &str,
        timeout: Duration,
        connection: DatabaseSection,
    ) -> Self {
        Self {
            executor,
            psql_bin: psql_bin.to_string(),
            timeout,
            connection,
        }
    }

    /// 在指定数据库上执行 SQL
    pub async fn execute(
        &self,
        database: &str,
        query: &str,
    ) -> Result<SqlExecuteResponse, DatabaseError> {
        if database.is_empty() || query.trim().is_empty() {
            return Err(DatabaseError::Validation(
                "Database and query are required".to_string(),
            ));
        }
        if self.connection.host.is_empty() || self.connection.user.is_empty() {
            return Err(DatabaseError::NotConfigured(
                "PostgreSQL connection is not configured".to_string(),
            ));
        }
        // 数据库名直接交给 -d，必须是普通标识符而不是连接串
        if !is_valid_identifier(database) {
            return Err(DatabaseError::Validation(format!(
                "Invalid database name \"{}\"",
                database
            )));
        }

        let argv = self.argv(database, query);
        let mut env = vec![("PGCONNECT_TIMEOUT".to_string(), "10".to_string())];
        if !self.connection.password.is_empty() {
            env.push(("PGPASSWORD".to_string(), self.connection.password.clone()));
        }

        let outcome = self.executor.execute_with_env(&argv, &env, self.timeout).await;
        if !outcome.succeeded {
            tracing::warn!(
                database = %database,
                exit_code = outcome.exit_code,
                "SQL execution failed"
            );
            let message = match outcome.stderr.trim() {
                "" => format!("psql failed with exit code {}", outcome.exit_code),
                stderr => stderr.to_string(),
            };
            return Err(DatabaseError::Execution {
                message,
                exit_code: outcome.exit_code,
                stderr: outcome.stderr,
            });
        }

        if is_select_statement(query) {
            let (columns, data) = parse_unaligned_rows(&outcome.stdout);
            tracing::info!(database = %database, rows = data.len(), "SELECT executed");
            Ok(SqlExecuteResponse::Rows(SqlSelectResponse {
                success: true,
                row_count: data.len(),
                columns,
                data,
            }))
        } else {
            let rows_affected = parse_affected_rows(&outcome.stdout);
            tracing::info!(database = %database, rows_affected, "Statement executed");
            Ok(SqlExecuteResponse::Command(SqlCommandResponse {
                success: true,
                message: format!(
                    "Query executed successfully. Rows affected: {}",
                    rows_affected
                ),
                rows_affected,
            }))
        }
    }

    fn argv(&self, database: &str, query: &str) -> Vec<String> {
        vec![
            self.psql_bin.clone(),
            "-X".to_string(),
            "-v".to_string(),
            "ON_ERROR_STOP=1".to_string(),
            "-h".to_string(),
            self.connection.host.clone(),
            "-p".to_string(),
            self.connection.port.to_string(),
            "-U".to_string(),
            self.connection.user.clone(),
            "-d".to_string(),
            database.to_string(),
            "-A".to_string(),
            "-F".to_string(),
            FIELD_SEPARATOR.to_string(),
            "-R".to_string(),
            RECORD_SEPARATOR.to_string(),
            "-P".to_string(),
            "footer=off".to_string(),
            "-P".to_string(),
            format!("null={}", NULL_MARKER),
            "-c".to_string(),
            query.to_string(),
        ]
    }
}
