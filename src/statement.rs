//! Prepared-statement handle objects.

use bytes::Bytes;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::{ConsistencyLevel, CqlResult};

/// A server-side prepared statement: a server-assigned handle referencing
/// a parsed query template plus its expected bound-parameter count.
///
/// Statements register with their connection's open-statements registry at
/// prepare time and deregister on [`close`]; closing the connection closes
/// every registered statement.
///
/// [`close`]: PreparedStatement::close
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    connection: Connection,
    handle: i32,
    parameter_count: usize,
}

impl PreparedStatement {
    pub(crate) fn new(connection: Connection, handle: i32, parameter_count: usize) -> Self {
        Self {
            connection,
            handle,
            parameter_count,
        }
    }

    /// Get the server-assigned statement handle.
    #[must_use]
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Get the number of bound parameters the statement expects.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Execute with positional bound values at the configured default
    /// consistency level.
    pub async fn execute(&self, values: Vec<Bytes>) -> Result<CqlResult> {
        let consistency = self.connection.config().consistency();
        self.execute_at(values, consistency).await
    }

    /// Execute with positional bound values at an explicit consistency
    /// level.
    pub async fn execute_at(
        &self,
        values: Vec<Bytes>,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        if !self.connection.statement_registered(self.handle) {
            return Err(Error::Configuration(format!(
                "prepared statement {} is closed",
                self.handle
            )));
        }
        if values.len() != self.parameter_count {
            return Err(Error::Configuration(format!(
                "expected {} bound values, got {}",
                self.parameter_count,
                values.len()
            )));
        }
        self.connection
            .execute_prepared(self.handle, values, consistency)
            .await
    }

    /// Deregister the statement from its connection. Returns whether it
    /// was still registered.
    pub fn close(&self) -> bool {
        self.connection.remove_statement(self.handle)
    }
}
