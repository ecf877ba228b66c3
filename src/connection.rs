//! Connection establishment and lifecycle.
//!
//! The two-phase protocol (discover, then connect) exists because the seed
//! used for topology discovery may not be an efficient or available
//! coordinator for ongoing traffic. Separating the phases lets the driver
//! prefer datacenter-local replicas for the long-lived session.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{Compression, ConsistencyLevel, CqlRpc, KeyspaceDef, ProtocolVersion};
use crate::selector::HostSelector;
use crate::topology::{self, ClusterTopology};
use crate::transport::{Connector, TcpConnector};

/// Liveness probe for clusters speaking CQL 2.
const IS_VALID_CQLQUERY_2_0_0: &str =
    "SELECT COUNT(1) FROM system.Versions WHERE component = 'cql';";
/// Liveness probe for clusters speaking CQL 3.
const IS_VALID_CQLQUERY_3_0_0: &str =
    "SELECT COUNT(1) FROM system.\"Versions\" WHERE component = 'cql';";

/// Failed-query bookkeeping attached to a session.
///
/// Recorded for observability only; nothing in the driver consults it for
/// circuit breaking or host demotion.
#[derive(Debug, Default)]
pub(crate) struct FailureTracker {
    count: AtomicU64,
    last: parking_lot::Mutex<Option<DateTime<Utc>>>,
}

impl FailureTracker {
    pub(crate) fn record(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
        *self.last.lock() = Some(Utc::now());
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn last(&self) -> Option<DateTime<Utc>> {
        *self.last.lock()
    }
}

pub(crate) struct ConnectionInner {
    pub(crate) config: Config,
    pub(crate) version: ProtocolVersion,
    pub(crate) cluster_name: String,
    pub(crate) rpc: Mutex<Box<dyn CqlRpc>>,
    pub(crate) keyspace: RwLock<Option<String>>,
    pub(crate) schema_defs: Vec<KeyspaceDef>,
    pub(crate) failures: FailureTracker,
    pub(crate) statements: RwLock<BTreeSet<i32>>,
}

/// A live, authenticated, version-negotiated session with one cluster node.
///
/// Cheap to clone; clones share the underlying session. Exactly one
/// physical transport is owned at a time.
#[derive(Clone)]
pub struct Connection {
    pub(crate) inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Resolve the cluster topology and connect to a selected candidate
    /// host, using the process-wide round-robin selector.
    ///
    /// Either yields a fully initialized session or fails once with a
    /// descriptive error; it never returns a partially initialized session.
    pub async fn connect(config: Config) -> Result<Self> {
        let connector = TcpConnector::new(config.connect_timeout());
        Self::connect_with(config, Arc::new(connector), HostSelector::shared()).await
    }

    /// Connect through an explicit connector and host selector.
    ///
    /// This is the seam for pools that want their own selector and for
    /// tests that substitute in-memory transports.
    pub async fn connect_with(
        config: Config,
        connector: Arc<dyn Connector>,
        selector: Arc<HostSelector>,
    ) -> Result<Self> {
        let seeds = config.seed_hosts();
        let version = ProtocolVersion::parse(config.cql_version());

        let topology = topology::resolve(
            connector.as_ref(),
            &seeds,
            config.port(),
            config.keyspace(),
            config.primary_dc(),
            config.backup_dc(),
        )
        .await?;

        let mut rpc =
            match Self::try_candidates(connector.as_ref(), &selector, &topology.primary, &config, version)
                .await
            {
                Some(rpc) => rpc,
                None => {
                    match Self::try_candidates(
                        connector.as_ref(),
                        &selector,
                        &topology.backup,
                        &config,
                        version,
                    )
                    .await
                    {
                        Some(rpc) => rpc,
                        None => {
                            return Err(Error::NonTransientConnection(
                                "all connection attempts failed; check the host specification \
                                 and server status"
                                    .into(),
                            ));
                        }
                    }
                }
            };

        // Schema decoding metadata, then the initial keyspace. A failure
        // here must not leak a half-initialized session.
        let schema_defs = match rpc.describe_keyspaces().await {
            Ok(defs) => defs,
            Err(e) => {
                rpc.close();
                return Err(e);
            }
        };
        if let Some(keyspace) = config.keyspace() {
            if let Err(e) = rpc.set_keyspace(keyspace).await {
                rpc.close();
                return Err(e);
            }
        }

        info!(
            cluster = %topology.cluster_name,
            keyspace = config.keyspace().unwrap_or(""),
            cql_version = config.cql_version(),
            consistency = ?config.consistency(),
            "connected"
        );

        let ClusterTopology { cluster_name, .. } = topology;
        let keyspace = config.keyspace().map(str::to_string);
        Ok(Self {
            inner: Arc::new(ConnectionInner {
                config,
                version,
                cluster_name,
                rpc: Mutex::new(rpc),
                keyspace: RwLock::new(keyspace),
                schema_defs,
                failures: FailureTracker::default(),
                statements: RwLock::new(BTreeSet::new()),
            }),
        })
    }

    /// Run the bounded retry loop over one candidate set. An empty set
    /// reports failure without attempting.
    async fn try_candidates(
        connector: &dyn Connector,
        selector: &HostSelector,
        candidates: &BTreeSet<String>,
        config: &Config,
        version: ProtocolVersion,
    ) -> Option<Box<dyn CqlRpc>> {
        if candidates.is_empty() {
            return None;
        }

        let mut retries = 0;
        while retries < config.connection_retries() {
            let host = selector.next(candidates)?;
            debug!(host, attempt = retries, "attempting connection");
            match Self::attempt(connector, host, config, version).await {
                Ok(rpc) => {
                    debug!(host, "connected to coordinator");
                    return Some(rpc);
                }
                Err(e) => {
                    error!(host, error = %e, "connection attempt failed");
                    retries += 1;
                }
            }
        }
        None
    }

    /// One connection attempt: open the transport, authenticate when
    /// credentials are configured, pin the CQL version when negotiated
    /// major > 2.
    async fn attempt(
        connector: &dyn Connector,
        host: &str,
        config: &Config,
        version: ProtocolVersion,
    ) -> Result<Box<dyn CqlRpc>> {
        let mut rpc = connector.connect(host, config.port()).await?;

        if let Some(username) = config.username() {
            let mut credentials = HashMap::new();
            credentials.insert("username".to_string(), username.to_string());
            if let Some(password) = config.password() {
                credentials.insert("password".to_string(), password.to_string());
            }
            if let Err(e) = rpc.login(&credentials).await {
                rpc.close();
                return Err(e);
            }
        }

        if version.major() > 2 {
            if let Err(e) = rpc.set_cql_version(config.cql_version()).await {
                rpc.close();
                return Err(e);
            }
        }

        Ok(rpc)
    }

    /// Get the driver configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the user-visible catalog identifier: the cluster name reported
    /// at discovery time.
    #[must_use]
    pub fn catalog(&self) -> &str {
        &self.inner.cluster_name
    }

    /// Get the current schema (keyspace).
    #[must_use]
    pub fn schema(&self) -> Option<String> {
        self.inner.keyspace.read().clone()
    }

    /// Set the current schema. Purely local bookkeeping; the session's
    /// server-side keyspace is chosen at connect time.
    pub fn set_schema(&self, keyspace: impl Into<String>) {
        *self.inner.keyspace.write() = Some(keyspace.into());
    }

    /// Get the negotiated protocol version.
    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.inner.version
    }

    /// Get the schema decoding metadata fetched at connect time.
    #[must_use]
    pub fn keyspace_defs(&self) -> &[KeyspaceDef] {
        &self.inner.schema_defs
    }

    /// Number of failed query attempts on this session.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.inner.failures.count()
    }

    /// Time of the most recent failed query attempt.
    #[must_use]
    pub fn last_failure(&self) -> Option<DateTime<Utc>> {
        self.inner.failures.last()
    }

    /// Whether the transport is live. This is the sole signal of
    /// "connected".
    pub async fn is_connected(&self) -> bool {
        self.inner.rpc.lock().await.is_open()
    }

    /// Liveness check with a transient socket timeout.
    ///
    /// A negative timeout fails immediately without touching the socket.
    /// The socket timeout is restored to "no timeout" even when the probe
    /// itself fails.
    pub async fn is_valid(&self, timeout_secs: i32) -> Result<bool> {
        if timeout_secs < 0 {
            return Err(Error::BadTimeout(
                "the liveness-check timeout must not be negative".into(),
            ));
        }

        let mut rpc = self.inner.rpc.lock().await;
        if !rpc.is_open() {
            return Ok(false);
        }

        let probe = if self.inner.version.is_cql3() {
            IS_VALID_CQLQUERY_3_0_0
        } else {
            IS_VALID_CQLQUERY_2_0_0
        };

        rpc.set_io_timeout(Duration::from_secs(u64::from(timeout_secs.unsigned_abs())));
        let outcome = self
            .inner
            .version
            .execute(
                &mut **rpc,
                Bytes::from_static(probe.as_bytes()),
                Compression::None,
                ConsistencyLevel::One,
            )
            .await;
        rpc.set_io_timeout(Duration::ZERO);

        Ok(outcome.is_ok())
    }

    /// Shut down the remote session: close every registered statement,
    /// then release the transport. Idempotent.
    pub async fn disconnect(&self) {
        self.inner.statements.write().clear();
        let mut rpc = self.inner.rpc.lock().await;
        rpc.close();
    }

    /// Remove a statement handle from the open-statements registry.
    /// Returns whether the handle was registered.
    pub fn remove_statement(&self, handle: i32) -> bool {
        self.inner.statements.write().remove(&handle)
    }

    pub(crate) fn register_statement(&self, handle: i32) {
        self.inner.statements.write().insert(handle);
    }

    pub(crate) fn statement_registered(&self, handle: i32) -> bool {
        self.inner.statements.read().contains(&handle)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("cluster", &self.inner.cluster_name)
            .field("keyspace", &self.schema())
            .field("failures", &self.failure_count())
            .finish()
    }
}
