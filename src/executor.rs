//! Query execution on a live session.
//!
//! Thin dispatch layer: selects the wire call for the negotiated protocol
//! version, keeps the cached current keyspace in sync with `USE`
//! statements, and maintains failure bookkeeping on transport errors.

use bytes::Bytes;
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::{Compression, ConsistencyLevel, CqlResult, CqlRpc};
use crate::statement::PreparedStatement;

/// Detect a `USE <keyspace>` statement by pure textual inspection; no
/// cluster round trip.
fn determine_keyspace(cql: &str) -> Option<String> {
    static USE_PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = USE_PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)^\s*use\s+"?([a-zA-Z0-9_]+)"?\s*;?\s*$"#).expect("valid pattern")
    });
    pattern
        .captures(cql)
        .map(|captures| captures[1].to_string())
}

impl Connection {
    /// Execute an ad hoc CQL query with the configured defaults.
    pub async fn execute(&self, cql: &str) -> Result<CqlResult> {
        self.execute_with(cql, self.inner.config.compression(), self.inner.config.consistency())
            .await
    }

    /// Execute an ad hoc CQL query at an explicit compression and
    /// consistency level.
    pub async fn execute_with(
        &self,
        cql: &str,
        compression: Compression,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        if let Some(keyspace) = determine_keyspace(cql) {
            *self.inner.keyspace.write() = Some(keyspace);
        }

        debug!(cql = %cql, "executing query");
        let mut rpc = self.inner.rpc.lock().await;
        let outcome = self
            .inner
            .version
            .execute(
                &mut **rpc,
                Bytes::copy_from_slice(cql.as_bytes()),
                compression,
                consistency,
            )
            .await;
        outcome.map_err(|e| self.after_query_error(&mut **rpc, e))
    }

    /// Prepare a CQL query with the configured default compression.
    pub async fn prepare(&self, cql: &str) -> Result<PreparedStatement> {
        self.prepare_with(cql, self.inner.config.compression()).await
    }

    /// Prepare a CQL query at an explicit compression, yielding a handle
    /// object for later bound execution.
    pub async fn prepare_with(
        &self,
        cql: &str,
        compression: Compression,
    ) -> Result<PreparedStatement> {
        debug!(cql = %cql, "preparing statement");
        let prepared = {
            let mut rpc = self.inner.rpc.lock().await;
            let outcome = self
                .inner
                .version
                .prepare(&mut **rpc, Bytes::copy_from_slice(cql.as_bytes()), compression)
                .await;
            outcome.map_err(|e| self.after_query_error(&mut **rpc, e))?
        };

        self.register_statement(prepared.item_id);
        let count = usize::try_from(prepared.count).unwrap_or(0);
        Ok(PreparedStatement::new(self.clone(), prepared.item_id, count))
    }

    /// Execute a previously prepared statement by its handle with
    /// positional bound values.
    pub(crate) async fn execute_prepared(
        &self,
        handle: i32,
        values: Vec<Bytes>,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        debug!(handle, values = values.len(), "executing prepared statement");
        let mut rpc = self.inner.rpc.lock().await;
        let outcome = self
            .inner
            .version
            .execute_prepared(&mut **rpc, handle, values, consistency)
            .await;
        outcome.map_err(|e| self.after_query_error(&mut **rpc, e))
    }

    /// Failure bookkeeping for query-time errors. Transport-level faults
    /// bump the failure counter; severe ones additionally close the
    /// transport so the session is unambiguously "not connected" and the
    /// caller re-establishes instead of retrying a poisoned socket.
    fn after_query_error(&self, rpc: &mut dyn CqlRpc, error: Error) -> Error {
        if error.counts_as_failure() {
            self.inner.failures.record();
        }
        if error.closes_session() {
            rpc.close();
        }
        error
    }
}
