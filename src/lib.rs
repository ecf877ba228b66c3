//! # ringcql
//!
//! Datacenter-aware CQL client driver for Cassandra-compatible clusters
//! speaking the framed Thrift RPC interface.
//!
//! The driver discovers the cluster's ring topology through any reachable
//! seed, partitions the members into primary and backup candidate sets by
//! datacenter preference, and drives bounded retry loops through a shared
//! round-robin host cursor until a coordinator accepts the session. The
//! resulting connection exposes ad hoc and prepared query execution with
//! per-session protocol-version negotiation.
//!
//! ## Features
//!
//! - **Topology discovery**: the ring description is fetched through any
//!   reachable seed, with graceful fallback to a direct connection when no
//!   ring is available
//! - **Datacenter-aware failover**: primary-datacenter candidates are tried
//!   first; the backup datacenter only on exhaustion
//! - **Round-robin coordinator selection**: a shared cursor spreads an
//!   application's connections across the candidate hosts
//! - **Version-negotiated execution**: cql3 or legacy wire calls are
//!   selected once per session and applied at every call site
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ringcql::{Config, Connection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ringcql::Error> {
//!     // Seed hosts are separated by `--`
//!     let config = Config::builder()
//!         .server_name("node1.example.com--node2.example.com")
//!         .keyspace("my_keyspace")
//!         .primary_dc("dc1")
//!         .backup_dc("dc2")
//!         .build();
//!
//!     let connection = Connection::connect(config).await?;
//!
//!     let result = connection
//!         .execute("SELECT * FROM users WHERE id = 42")
//!         .await?;
//!     println!("{} rows", result.rows.len());
//!
//!     connection.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Prepared Statements
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use ringcql::Connection;
//!
//! async fn lookup(connection: &Connection, id: Bytes) -> Result<(), ringcql::Error> {
//!     let statement = connection
//!         .prepare("SELECT * FROM users WHERE id = ?")
//!         .await?;
//!     let result = statement.execute(vec![id]).await?;
//!     println!("{} rows", result.rows.len());
//!     statement.close();
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod connection;
mod error;
mod executor;
mod protocol;
mod selector;
mod statement;
mod thrift;
mod topology;
mod transport;

pub use config::{Config, ConfigBuilder, DEFAULT_CQL_VERSION, DEFAULT_PORT, HOST_SEPARATOR};
pub use connection::Connection;
pub use error::{Error, Result};
pub use protocol::{
    Column, ColumnDef, Compression, ConsistencyLevel, CqlMetadata, CqlPreparedResult, CqlResult,
    CqlResultType, CqlRow, CqlRpc, EndpointDetails, KeyspaceDef, ProtocolVersion, TableDef,
    TokenRange,
};
pub use selector::HostSelector;
pub use statement::PreparedStatement;
pub use topology::ClusterTopology;
pub use transport::{Connector, TcpConnector};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{Config, ConfigBuilder};
    pub use crate::connection::Connection;
    pub use crate::error::{Error, Result};
    pub use crate::protocol::{Compression, ConsistencyLevel, CqlResult, ProtocolVersion};
    pub use crate::selector::HostSelector;
    pub use crate::statement::PreparedStatement;
    pub use crate::transport::{Connector, TcpConnector};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_roundtrip() {
        let config = Config::builder()
            .server_name("127.0.0.1")
            .keyspace("test")
            .build();

        assert_eq!(config.keyspace(), Some("test"));
        assert_eq!(config.seed_hosts(), vec!["127.0.0.1".to_string()]);
        assert_eq!(config.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_url_roundtrip() {
        let config = Config::from_url("cassandra://localhost:9160/my_keyspace").unwrap();
        assert_eq!(config.keyspace(), Some("my_keyspace"));
        assert_eq!(config.cql_version(), DEFAULT_CQL_VERSION);
    }
}
