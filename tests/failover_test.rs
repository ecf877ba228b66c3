//! Integration tests for topology discovery, datacenter failover, and
//! version-dispatched query execution.
//!
//! These tests drive the full connection workflow against an in-memory
//! cluster double that records every transport attempt and RPC call:
//! - Seed discovery and ring-fetch fallback
//! - Primary/backup candidate failover with a bounded retry budget
//! - Authentication and CQL version negotiation at session setup
//! - cql3 vs legacy wire-call selection
//! - Failure bookkeeping and the liveness probe's timeout restore

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use ringcql::{
    Config, Connection, Connector, ConsistencyLevel, CqlPreparedResult, CqlResult, CqlRpc,
    EndpointDetails, Error, HostSelector, KeyspaceDef, Result, TokenRange,
};

/// Scripted cluster shared by a connector and every session it hands out.
#[derive(Default)]
struct ClusterState {
    cluster_name: String,
    ring: Vec<TokenRange>,
    ring_fails: bool,
    refuse: BTreeSet<String>,
    login_fails: bool,
    connect_attempts: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    io_timeouts: Mutex<Vec<Duration>>,
    execute_errors: Mutex<VecDeque<Error>>,
}

impl ClusterState {
    fn named(cluster_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            ..Self::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn attempts_to(&self, host: &str) -> usize {
        self.connect_attempts
            .lock()
            .iter()
            .filter(|h| h.as_str() == host)
            .count()
    }
}

/// One token range whose endpoints carry the given datacenter labels.
fn ring(entries: &[(&str, &str)]) -> Vec<TokenRange> {
    vec![TokenRange {
        start_token: "0".into(),
        end_token: "0".into(),
        endpoint_details: entries
            .iter()
            .map(|(host, dc)| EndpointDetails {
                host: (*host).to_string(),
                datacenter: (*dc).to_string(),
                rack: None,
            })
            .collect(),
    }]
}

struct MockConnector {
    state: Arc<ClusterState>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, host: &str, _port: u16) -> Result<Box<dyn CqlRpc>> {
        self.state.connect_attempts.lock().push(host.to_string());
        if self.state.refuse.contains(host) {
            return Err(Error::Connect(format!("{host}: connection refused")));
        }
        Ok(Box::new(MockRpc {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct MockRpc {
    state: Arc<ClusterState>,
    open: bool,
}

impl MockRpc {
    fn scripted_result(&self) -> Result<CqlResult> {
        match self.state.execute_errors.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(CqlResult::void()),
        }
    }
}

#[async_trait]
impl CqlRpc for MockRpc {
    async fn describe_cluster_name(&mut self) -> Result<String> {
        self.state.record("describe_cluster_name");
        Ok(self.state.cluster_name.clone())
    }

    async fn describe_ring(&mut self, _keyspace: &str) -> Result<Vec<TokenRange>> {
        self.state.record("describe_ring");
        if self.state.ring_fails {
            return Err(Error::Transport("ring unavailable".into()));
        }
        Ok(self.state.ring.clone())
    }

    async fn describe_keyspaces(&mut self) -> Result<Vec<KeyspaceDef>> {
        self.state.record("describe_keyspaces");
        Ok(Vec::new())
    }

    async fn set_keyspace(&mut self, _keyspace: &str) -> Result<()> {
        self.state.record("set_keyspace");
        Ok(())
    }

    async fn login(&mut self, _credentials: &HashMap<String, String>) -> Result<()> {
        self.state.record("login");
        if self.state.login_fails {
            return Err(Error::Authentication("bad credentials".into()));
        }
        Ok(())
    }

    async fn set_cql_version(&mut self, _version: &str) -> Result<()> {
        self.state.record("set_cql_version");
        Ok(())
    }

    async fn execute_cql_query(
        &mut self,
        _query: Bytes,
        _compression: ringcql::Compression,
    ) -> Result<CqlResult> {
        self.state.record("execute_cql_query");
        self.scripted_result()
    }

    async fn execute_cql3_query(
        &mut self,
        _query: Bytes,
        _compression: ringcql::Compression,
        _consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        self.state.record("execute_cql3_query");
        self.scripted_result()
    }

    async fn prepare_cql_query(
        &mut self,
        _query: Bytes,
        _compression: ringcql::Compression,
    ) -> Result<CqlPreparedResult> {
        self.state.record("prepare_cql_query");
        Ok(CqlPreparedResult {
            item_id: 7,
            count: 1,
            variable_types: Vec::new(),
            variable_names: Vec::new(),
        })
    }

    async fn prepare_cql3_query(
        &mut self,
        _query: Bytes,
        _compression: ringcql::Compression,
    ) -> Result<CqlPreparedResult> {
        self.state.record("prepare_cql3_query");
        Ok(CqlPreparedResult {
            item_id: 7,
            count: 1,
            variable_types: Vec::new(),
            variable_names: Vec::new(),
        })
    }

    async fn execute_prepared_cql_query(
        &mut self,
        _item_id: i32,
        _values: Vec<Bytes>,
    ) -> Result<CqlResult> {
        self.state.record("execute_prepared_cql_query");
        self.scripted_result()
    }

    async fn execute_prepared_cql3_query(
        &mut self,
        _item_id: i32,
        _values: Vec<Bytes>,
        _consistency: ConsistencyLevel,
    ) -> Result<CqlResult> {
        self.state.record("execute_prepared_cql3_query");
        self.scripted_result()
    }

    fn set_io_timeout(&mut self, timeout: Duration) {
        self.state.io_timeouts.lock().push(timeout);
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}

async fn connect(config: Config, state: &Arc<ClusterState>) -> Result<Connection> {
    let connector = Arc::new(MockConnector {
        state: Arc::clone(state),
    });
    // Each test gets its own selector so cursor state cannot leak between
    // tests running in the same process.
    Connection::connect_with(config, connector, Arc::new(HostSelector::new())).await
}

/// Exhausting both candidate sets yields a non-transient error after exactly
/// `connection_retries` attempts per set.
#[tokio::test]
async fn test_retry_budget_exhaustion() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1"), ("node2", "dc2")]);
    state.refuse = ["node1", "node2"].iter().map(|h| (*h).to_string()).collect();
    let state = Arc::new(state);

    let config = Config::builder()
        .server_name("seed1")
        .primary_dc("dc1")
        .backup_dc("dc2")
        .connection_retries(3)
        .build();

    let outcome = connect(config, &state).await;
    assert!(matches!(outcome, Err(Error::NonTransientConnection(_))));

    // One discovery connection to the seed, then the full budget against
    // each candidate set.
    assert_eq!(state.attempts_to("seed1"), 1);
    assert_eq!(state.attempts_to("node1"), 3);
    assert_eq!(state.attempts_to("node2"), 3);
}

/// With no endpoint in the primary datacenter, the backup set is used
/// without burning the primary retry budget.
#[tokio::test]
async fn test_empty_primary_fails_over_to_backup() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node-b1", "dc2"), ("node-b2", "dc2")]);
    let state = Arc::new(state);

    let config = Config::builder()
        .server_name("seed1")
        .primary_dc("dc1")
        .backup_dc("dc2")
        .build();

    let connection = connect(config, &state).await.unwrap();
    assert_eq!(connection.catalog(), "TestCluster");
    let attempts = state.connect_attempts.lock().clone();
    // Discovery plus exactly one successful attempt at a backup node.
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1].starts_with("node-b"));
}

/// A failed ring fetch falls back to the first configured host instead of
/// failing the connection.
#[tokio::test]
async fn test_ring_failure_falls_back_to_first_host() {
    let mut state = ClusterState::named("TestCluster");
    state.ring_fails = true;
    let state = Arc::new(state);

    let config = Config::builder()
        .server_name("seedA--seedB")
        .build();

    let connection = connect(config, &state).await.unwrap();
    assert!(connection.is_connected().await);
    // The session connection after discovery targets the first host.
    let attempts = state.connect_attempts.lock().clone();
    assert_eq!(attempts.last().map(String::as_str), Some("seedA"));
}

/// An unreachable seed does not fail discovery while another seed answers.
#[tokio::test]
async fn test_discovery_survives_dead_seeds() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("good", "dc1")]);
    state.refuse = std::iter::once("dead".to_string()).collect();
    let state = Arc::new(state);

    let config = Config::builder().server_name("good--dead--good2--good3").build();

    // Seed choice is randomized; whichever seed is drawn, discovery must
    // converge on the reachable one.
    let connection = connect(config, &state).await.unwrap();
    assert_eq!(connection.catalog(), "TestCluster");
}

/// CQL 3 sessions negotiate the version and use the cql3 wire calls for all
/// three operation kinds.
#[tokio::test]
async fn test_cql3_dispatch() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let config = Config::builder()
        .server_name("node1")
        .cql_version("3.0.0")
        .build();

    let connection = connect(config, &state).await.unwrap();
    connection.execute("SELECT * FROM t").await.unwrap();
    let statement = connection.prepare("SELECT * FROM t WHERE k = ?").await.unwrap();
    statement.execute(vec![Bytes::from_static(b"k")]).await.unwrap();

    let calls = state.calls();
    assert!(calls.contains(&"set_cql_version".to_string()));
    assert!(calls.contains(&"execute_cql3_query".to_string()));
    assert!(calls.contains(&"prepare_cql3_query".to_string()));
    assert!(calls.contains(&"execute_prepared_cql3_query".to_string()));
    assert!(!calls.contains(&"execute_cql_query".to_string()));
    assert!(!calls.contains(&"prepare_cql_query".to_string()));
}

/// CQL 2 sessions skip version negotiation and use the legacy wire calls.
#[tokio::test]
async fn test_legacy_dispatch() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let config = Config::builder()
        .server_name("node1")
        .cql_version("2.0.0")
        .build();

    let connection = connect(config, &state).await.unwrap();
    connection.execute("SELECT * FROM t").await.unwrap();
    let statement = connection.prepare("SELECT * FROM t WHERE k = ?").await.unwrap();
    statement.execute(vec![Bytes::from_static(b"k")]).await.unwrap();

    let calls = state.calls();
    assert!(!calls.contains(&"set_cql_version".to_string()));
    assert!(calls.contains(&"execute_cql_query".to_string()));
    assert!(calls.contains(&"prepare_cql_query".to_string()));
    assert!(calls.contains(&"execute_prepared_cql_query".to_string()));
}

/// The login handshake runs exactly when credentials are configured.
#[tokio::test]
async fn test_login_only_with_credentials() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let anonymous = Config::builder().server_name("node1").build();
    connect(anonymous, &state).await.unwrap();
    assert!(!state.calls().contains(&"login".to_string()));

    let authenticated = Config::builder()
        .server_name("node1")
        .username("cassandra")
        .password("cassandra")
        .build();
    connect(authenticated, &state).await.unwrap();
    assert!(state.calls().contains(&"login".to_string()));
}

/// A rejected login consumes the retry budget like any other failed attempt.
#[tokio::test]
async fn test_auth_failure_consumes_retries() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    state.login_fails = true;
    let state = Arc::new(state);

    let config = Config::builder()
        .server_name("node1")
        .username("cassandra")
        .password("wrong")
        .connection_retries(2)
        .build();

    let outcome = connect(config, &state).await;
    assert!(matches!(outcome, Err(Error::NonTransientConnection(_))));
    let logins = state.calls().iter().filter(|c| *c == "login").count();
    assert_eq!(logins, 2);
}

/// Connecting with a configured keyspace switches the session to it and
/// reports it as the current schema.
#[tokio::test]
async fn test_connect_reports_catalog_and_schema() {
    let mut state = ClusterState::named("Production Cluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let config = Config::builder()
        .server_name("node1")
        .keyspace("app_data")
        .build();

    let connection = connect(config, &state).await.unwrap();
    assert_eq!(connection.catalog(), "Production Cluster");
    assert_eq!(connection.schema().as_deref(), Some("app_data"));
    assert!(state.calls().contains(&"set_keyspace".to_string()));
}

/// A textual `USE` statement updates the cached schema.
#[tokio::test]
async fn test_use_statement_updates_schema() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let config = Config::builder()
        .server_name("node1")
        .keyspace("app_data")
        .build();

    let connection = connect(config, &state).await.unwrap();
    connection.execute("USE other_ks").await.unwrap();
    assert_eq!(connection.schema().as_deref(), Some("other_ks"));
}

/// The liveness probe rejects negative timeouts without touching the socket.
#[tokio::test]
async fn test_is_valid_rejects_negative_timeout() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let connection = connect(Config::builder().server_name("node1").build(), &state)
        .await
        .unwrap();
    let outcome = connection.is_valid(-1).await;
    assert!(matches!(outcome, Err(Error::BadTimeout(_))));
    assert!(state.io_timeouts.lock().is_empty());
}

/// The liveness probe restores the "no timeout" state even when the probe
/// query fails, and reports the failure as not-valid rather than an error.
#[tokio::test]
async fn test_is_valid_restores_timeout_on_probe_failure() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let connection = connect(Config::builder().server_name("node1").build(), &state)
        .await
        .unwrap();

    assert!(connection.is_valid(5).await.unwrap());

    state
        .execute_errors
        .lock()
        .push_back(Error::Timeout("probe timed out".into()));
    assert!(!connection.is_valid(5).await.unwrap());

    let timeouts = state.io_timeouts.lock().clone();
    assert_eq!(
        timeouts,
        vec![
            Duration::from_secs(5),
            Duration::ZERO,
            Duration::from_secs(5),
            Duration::ZERO,
        ]
    );
}

/// Unavailable errors count as failures and close the session; timeouts
/// count but leave the session open; syntax errors do neither.
#[tokio::test]
async fn test_failure_bookkeeping() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let connection = connect(Config::builder().server_name("node1").build(), &state)
        .await
        .unwrap();

    state
        .execute_errors
        .lock()
        .push_back(Error::Syntax("bad query".into()));
    assert!(matches!(
        connection.execute("SELEC bogus").await,
        Err(Error::Syntax(_))
    ));
    assert_eq!(connection.failure_count(), 0);
    assert!(connection.last_failure().is_none());
    assert!(connection.is_connected().await);

    state
        .execute_errors
        .lock()
        .push_back(Error::Timeout("coordinator timeout".into()));
    assert!(matches!(
        connection.execute("SELECT * FROM t").await,
        Err(Error::Timeout(_))
    ));
    assert_eq!(connection.failure_count(), 1);
    assert!(connection.last_failure().is_some());
    assert!(connection.is_connected().await);

    state
        .execute_errors
        .lock()
        .push_back(Error::Unavailable("not enough replicas".into()));
    assert!(matches!(
        connection.execute("SELECT * FROM t").await,
        Err(Error::Unavailable(_))
    ));
    assert_eq!(connection.failure_count(), 2);
    assert!(!connection.is_connected().await);
}

/// Closing a statement deregisters it; further executions fail locally.
#[tokio::test]
async fn test_closed_statement_rejects_execution() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let connection = connect(Config::builder().server_name("node1").build(), &state)
        .await
        .unwrap();
    let statement = connection.prepare("SELECT * FROM t WHERE k = ?").await.unwrap();
    assert_eq!(statement.parameter_count(), 1);

    assert!(statement.close());
    assert!(!statement.close());
    assert!(matches!(
        statement.execute(vec![Bytes::from_static(b"k")]).await,
        Err(Error::Configuration(_))
    ));
}

/// Bound-value arity is checked before anything reaches the wire.
#[tokio::test]
async fn test_statement_checks_value_count() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let connection = connect(Config::builder().server_name("node1").build(), &state)
        .await
        .unwrap();
    let statement = connection.prepare("SELECT * FROM t WHERE k = ?").await.unwrap();

    let outcome = statement.execute(Vec::new()).await;
    assert!(matches!(outcome, Err(Error::Configuration(_))));
    assert!(!state.calls().iter().any(|c| c.starts_with("execute_prepared")));
}

/// Disconnect clears the statement registry and closes the transport.
#[tokio::test]
async fn test_disconnect_closes_statements_and_transport() {
    let mut state = ClusterState::named("TestCluster");
    state.ring = ring(&[("node1", "dc1")]);
    let state = Arc::new(state);

    let connection = connect(Config::builder().server_name("node1").build(), &state)
        .await
        .unwrap();
    let statement = connection.prepare("SELECT * FROM t WHERE k = ?").await.unwrap();

    connection.disconnect().await;
    assert!(!connection.is_connected().await);
    assert!(!statement.close());
    assert!(!connection.is_valid(1).await.unwrap());
}
