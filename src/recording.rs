use crate::database::{BoxError, Database, SqlValue};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// A statement seen by [`RecordingDatabase`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// A database handle that keeps every statement instead of running it.
///
/// Useful for unit tests and for inspecting the SQL a store would send
/// to a backend that is not reachable from the current process. It can
/// be told to fail, which makes every subsequent `execute` return that
/// error.
#[derive(Debug, Default)]
pub struct RecordingDatabase {
    driver: Option<String>,
    statements: Mutex<Vec<ExecutedStatement>>,
    failure: Mutex<Option<String>>,
}

impl RecordingDatabase {
    /// Handle that reports `driver` from [`Database::driver_name`].
    pub fn new(driver: impl Into<String>) -> Self {
        RecordingDatabase {
            driver: Some(driver.into()),
            ..Default::default()
        }
    }

    /// Handle that reports no driver name at all.
    pub fn anonymous() -> Self {
        RecordingDatabase::default()
    }

    /// Make every following `execute` call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn statements(&self) -> Vec<ExecutedStatement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Database for RecordingDatabase {
    fn driver_name(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, BoxError> {
        if let Some(message) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(message.into());
        }

        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ExecutedStatement {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
        Ok(1)
    }
}
