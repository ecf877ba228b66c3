//! Wire-level protocol surface.
//!
//! Defines the RPC calls the driver consumes, the data structures they
//! exchange, and the protocol-version dispatch table that selects between
//! the legacy and cql3 call variants.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Replica-acknowledgment policy requested for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    /// Single node.
    #[default]
    One,
    /// Quorum of nodes.
    Quorum,
    /// Local quorum.
    LocalQuorum,
    /// Quorum in each datacenter.
    EachQuorum,
    /// All nodes.
    All,
    /// Any node.
    Any,
    /// Two nodes.
    Two,
    /// Three nodes.
    Three,
    /// Serial (LWT).
    Serial,
    /// Local serial (LWT).
    LocalSerial,
    /// One node in the local datacenter.
    LocalOne,
}

impl ConsistencyLevel {
    /// Wire value of the consistency level.
    #[must_use]
    pub fn wire(self) -> i32 {
        match self {
            Self::One => 1,
            Self::Quorum => 2,
            Self::LocalQuorum => 3,
            Self::EachQuorum => 4,
            Self::All => 5,
            Self::Any => 6,
            Self::Two => 7,
            Self::Three => 8,
            Self::Serial => 9,
            Self::LocalSerial => 10,
            Self::LocalOne => 11,
        }
    }
}

impl FromStr for ConsistencyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ONE" => Ok(Self::One),
            "QUORUM" => Ok(Self::Quorum),
            "LOCAL_QUORUM" => Ok(Self::LocalQuorum),
            "EACH_QUORUM" => Ok(Self::EachQuorum),
            "ALL" => Ok(Self::All),
            "ANY" => Ok(Self::Any),
            "TWO" => Ok(Self::Two),
            "THREE" => Ok(Self::Three),
            "SERIAL" => Ok(Self::Serial),
            "LOCAL_SERIAL" => Ok(Self::LocalSerial),
            "LOCAL_ONE" => Ok(Self::LocalOne),
            other => Err(Error::config(format!("unknown consistency level: {other}"))),
        }
    }
}

/// Query-text compression requested on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compression {
    /// No compression.
    #[default]
    None,
    /// GZIP compression. Recognized for wire compatibility; the transport
    /// rejects it since the driver never compresses outgoing query text.
    Gzip,
}

impl Compression {
    /// Wire value of the compression option.
    #[must_use]
    pub fn wire(self) -> i32 {
        match self {
            Self::Gzip => 1,
            Self::None => 2,
        }
    }
}

/// Negotiated protocol major version.
///
/// Parsed from the leading numeric component of the requested CQL version
/// string; defaults to 2 when unparsable. Determines which pair of wire
/// calls every execute/prepare call site uses for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    major: u32,
}

impl ProtocolVersion {
    /// Parse the major version from a `major.minor.patch` version string.
    #[must_use]
    pub fn parse(version: &str) -> Self {
        let major = version
            .split('.')
            .next()
            .and_then(|part| part.parse().ok())
            .unwrap_or(2);
        Self { major }
    }

    /// Get the major version number.
    #[must_use]
    pub fn major(self) -> u32 {
        self.major
    }

    /// Whether the cql3 wire-call variants are in effect.
    #[must_use]
    pub fn is_cql3(self) -> bool {
        self.major == 3
    }

    /// Execute an ad hoc query through the version-appropriate wire call.
    pub async fn execute(
        self,
        rpc: &mut dyn CqlRpc,
        query: Bytes,
        compression: Compression,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        if self.is_cql3() {
            rpc.execute_cql3_query(query, compression, consistency).await
        } else {
            rpc.execute_cql_query(query, compression).await
        }
    }

    /// Prepare a query through the version-appropriate wire call.
    pub async fn prepare(
        self,
        rpc: &mut dyn CqlRpc,
        query: Bytes,
        compression: Compression,
    ) -> Result<CqlPreparedResult> {
        if self.is_cql3() {
            rpc.prepare_cql3_query(query, compression).await
        } else {
            rpc.prepare_cql_query(query, compression).await
        }
    }

    /// Execute a prepared statement through the version-appropriate wire call.
    pub async fn execute_prepared(
        self,
        rpc: &mut dyn CqlRpc,
        item_id: i32,
        values: Vec<Bytes>,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        if self.is_cql3() {
            rpc.execute_prepared_cql3_query(item_id, values, consistency)
                .await
        } else {
            rpc.execute_prepared_cql_query(item_id, values).await
        }
    }
}

/// Kind of payload carried by a [`CqlResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CqlResultType {
    /// Row data.
    Rows,
    /// No payload.
    Void,
    /// Single integer payload.
    Int,
}

impl CqlResultType {
    /// Decode the wire value.
    #[must_use]
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Rows),
            2 => Some(Self::Void),
            3 => Some(Self::Int),
            _ => None,
        }
    }
}

/// A single named cell in a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Raw column name.
    pub name: Bytes,
    /// Raw column value; absent for deleted cells.
    pub value: Option<Bytes>,
    /// Write timestamp, when the server reports one.
    pub timestamp: Option<i64>,
    /// Remaining time to live in seconds.
    pub ttl: Option<i32>,
}

/// A result row: a row key plus its columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CqlRow {
    /// Raw row key.
    pub key: Bytes,
    /// Columns of the row, in server order.
    pub columns: Vec<Column>,
}

/// Decoding hints for result rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CqlMetadata {
    /// Per-column comparator types for names.
    pub name_types: HashMap<Bytes, String>,
    /// Per-column validator types for values.
    pub value_types: HashMap<Bytes, String>,
    /// Comparator applied to names not listed above.
    pub default_name_type: String,
    /// Validator applied to values not listed above.
    pub default_value_type: String,
}

/// Result of an execute call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqlResult {
    /// Payload kind.
    pub result_type: CqlResultType,
    /// Row data for [`CqlResultType::Rows`] results.
    pub rows: Vec<CqlRow>,
    /// Integer payload for [`CqlResultType::Int`] results.
    pub num: Option<i32>,
    /// Decoding hints, when the server provides them.
    pub schema: Option<CqlMetadata>,
}

impl CqlResult {
    /// A void result.
    #[must_use]
    pub fn void() -> Self {
        Self {
            result_type: CqlResultType::Void,
            rows: Vec::new(),
            num: None,
            schema: None,
        }
    }
}

/// Result of a prepare call: server-assigned statement handle plus the
/// number of bound parameters the statement expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqlPreparedResult {
    /// Server-assigned statement handle.
    pub item_id: i32,
    /// Expected bound-parameter count.
    pub count: i32,
    /// Validator types of the bound variables, when reported.
    pub variable_types: Vec<String>,
    /// Names of the bound variables, when reported.
    pub variable_names: Vec<String>,
}

/// A cluster member as reported by the ring description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDetails {
    /// Host address.
    pub host: String,
    /// Datacenter label.
    pub datacenter: String,
    /// Rack label, when reported.
    pub rack: Option<String>,
}

/// One token range of the ring and the endpoints that serve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRange {
    /// Start token.
    pub start_token: String,
    /// End token.
    pub end_token: String,
    /// Serving endpoints with datacenter labels.
    pub endpoint_details: Vec<EndpointDetails>,
}

/// A column definition inside a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Raw column name.
    pub name: Bytes,
    /// Validator class of the column values.
    pub validation_class: String,
}

/// A table (column family) definition inside a keyspace definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Known column definitions.
    pub columns: Vec<ColumnDef>,
}

/// Schema decoding metadata for one keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceDef {
    /// Keyspace name.
    pub name: String,
    /// Replication strategy class.
    pub strategy_class: String,
    /// Table definitions.
    pub tables: Vec<TableDef>,
}

/// One live RPC session to exactly one cluster node.
///
/// Owns the physical transport. Implementations must make [`close`]
/// idempotent and report liveness only through [`is_open`].
///
/// [`close`]: CqlRpc::close
/// [`is_open`]: CqlRpc::is_open
#[async_trait]
pub trait CqlRpc: Send {
    /// Ask the cluster for its user-visible name.
    async fn describe_cluster_name(&mut self) -> Result<String>;

    /// Fetch the ring topology for a keyspace.
    async fn describe_ring(&mut self, keyspace: &str) -> Result<Vec<TokenRange>>;

    /// Fetch schema decoding metadata for every keyspace.
    async fn describe_keyspaces(&mut self) -> Result<Vec<KeyspaceDef>>;

    /// Switch the session to a keyspace.
    async fn set_keyspace(&mut self, keyspace: &str) -> Result<()>;

    /// Perform the authentication handshake.
    async fn login(&mut self, credentials: &HashMap<String, String>) -> Result<()>;

    /// Pin the session to an explicit CQL version.
    async fn set_cql_version(&mut self, version: &str) -> Result<()>;

    /// Execute an ad hoc query (legacy variant).
    async fn execute_cql_query(
        &mut self,
        query: Bytes,
        compression: Compression,
    ) -> Result<CqlResult>;

    /// Execute an ad hoc query (cql3 variant).
    async fn execute_cql3_query(
        &mut self,
        query: Bytes,
        compression: Compression,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult>;

    /// Prepare a query (legacy variant).
    async fn prepare_cql_query(
        &mut self,
        query: Bytes,
        compression: Compression,
    ) -> Result<CqlPreparedResult>;

    /// Prepare a query (cql3 variant).
    async fn prepare_cql3_query(
        &mut self,
        query: Bytes,
        compression: Compression,
    ) -> Result<CqlPreparedResult>;

    /// Execute a prepared statement (legacy variant).
    async fn execute_prepared_cql_query(
        &mut self,
        item_id: i32,
        values: Vec<Bytes>,
    ) -> Result<CqlResult>;

    /// Execute a prepared statement (cql3 variant).
    async fn execute_prepared_cql3_query(
        &mut self,
        item_id: i32,
        values: Vec<Bytes>,
        consistency: ConsistencyLevel,
    ) -> Result<CqlResult>;

    /// Apply a read/write timeout to the transport. [`Duration::ZERO`]
    /// means no timeout.
    fn set_io_timeout(&mut self, timeout: Duration);

    /// Whether the transport is live.
    fn is_open(&self) -> bool;

    /// Release the transport. Idempotent.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse_major() {
        assert_eq!(ProtocolVersion::parse("3.0.0").major(), 3);
        assert_eq!(ProtocolVersion::parse("2.0.0").major(), 2);
        assert_eq!(ProtocolVersion::parse("4.1").major(), 4);
        assert_eq!(ProtocolVersion::parse("3").major(), 3);
    }

    #[test]
    fn test_version_parse_defaults_to_two() {
        assert_eq!(ProtocolVersion::parse("").major(), 2);
        assert_eq!(ProtocolVersion::parse("latest").major(), 2);
        assert_eq!(ProtocolVersion::parse(".0.0").major(), 2);
    }

    #[test]
    fn test_is_cql3() {
        assert!(ProtocolVersion::parse("3.0.0").is_cql3());
        assert!(!ProtocolVersion::parse("2.0.0").is_cql3());
        assert!(!ProtocolVersion::parse("4.0.0").is_cql3());
    }

    #[test]
    fn test_consistency_from_str() {
        assert_eq!(
            "QUORUM".parse::<ConsistencyLevel>().unwrap(),
            ConsistencyLevel::Quorum
        );
        assert_eq!(
            "local_quorum".parse::<ConsistencyLevel>().unwrap(),
            ConsistencyLevel::LocalQuorum
        );
        assert!("FASTEST".parse::<ConsistencyLevel>().is_err());
    }

    #[test]
    fn test_consistency_wire_values() {
        assert_eq!(ConsistencyLevel::One.wire(), 1);
        assert_eq!(ConsistencyLevel::Quorum.wire(), 2);
        assert_eq!(ConsistencyLevel::Any.wire(), 6);
        assert_eq!(ConsistencyLevel::LocalOne.wire(), 11);
    }

    #[test]
    fn test_result_type_from_wire() {
        assert_eq!(CqlResultType::from_wire(1), Some(CqlResultType::Rows));
        assert_eq!(CqlResultType::from_wire(2), Some(CqlResultType::Void));
        assert_eq!(CqlResultType::from_wire(3), Some(CqlResultType::Int));
        assert_eq!(CqlResultType::from_wire(9), None);
    }
}
