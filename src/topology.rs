//! Cluster topology discovery.
//!
//! Connects to any reachable seed, asks the cluster for its ring
//! description, and classifies every member endpoint into a primary set and
//! an optional backup set based on the configured datacenter preference.

use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::TokenRange;
use crate::transport::Connector;

/// Bound on attempts to reach any seed during discovery.
const SEED_RETRIES: u32 = 10;

/// The cluster as seen from one topology query.
///
/// Candidate sets are ordered and duplicate-free; their lexicographic
/// iteration order is what gives the round-robin cursor a stable meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    /// User-visible cluster name, used as the catalog identifier.
    pub cluster_name: String,
    /// Datacenter-preferred hosts, or all hosts when no preference is
    /// configured.
    pub primary: BTreeSet<String>,
    /// Hosts in the alternate datacenter; populated only when a primary
    /// preference is configured.
    pub backup: BTreeSet<String>,
}

/// Discover the ring through any reachable seed and build the candidate
/// host sets.
///
/// The exploratory transport is always closed before returning; the caller
/// opens a fresh transport to a selected candidate afterwards.
pub(crate) async fn resolve(
    connector: &dyn Connector,
    seeds: &[String],
    port: u16,
    keyspace: Option<&str>,
    primary_dc: &str,
    backup_dc: &str,
) -> Result<ClusterTopology> {
    if seeds.is_empty() {
        return Err(Error::config("no seed hosts configured"));
    }

    let mut rpc = None;
    let mut retries = 0;
    while rpc.is_none() && retries < SEED_RETRIES {
        let seed = &seeds[rand::thread_rng().gen_range(0..seeds.len())];
        debug!(seed = %seed, "contacting seed for topology discovery");
        match connector.connect(seed, port).await {
            Ok(session) => rpc = Some(session),
            Err(e) => {
                warn!(seed = %seed, error = %e, "unable to connect to seed");
                retries += 1;
            }
        }
    }
    let Some(mut rpc) = rpc else {
        return Err(Error::NonTransientConnection(format!(
            "no seed reachable after {SEED_RETRIES} attempts"
        )));
    };

    let outcome = async {
        let cluster_name = rpc.describe_cluster_name().await?;

        let mut primary = BTreeSet::new();
        let mut backup = BTreeSet::new();
        match rpc.describe_ring(keyspace.unwrap_or_default()).await {
            Ok(ring) => classify(&ring, primary_dc, backup_dc, &mut primary, &mut backup),
            Err(e) => {
                // A node that just started, or a keyspace the cluster does
                // not know yet, legitimately has no ring to report. Fall
                // back to a direct connection to the configured host.
                warn!(
                    keyspace = keyspace.unwrap_or(""),
                    error = %e,
                    "no ring description available, falling back to the configured host"
                );
                primary.insert(seeds[0].clone());
            }
        }

        debug!(?primary, ?backup, cluster = %cluster_name, "topology resolved");
        Ok(ClusterTopology {
            cluster_name,
            primary,
            backup,
        })
    }
    .await;

    rpc.close();
    outcome
}

/// Partition ring endpoints by datacenter preference.
///
/// With a primary preference configured, endpoints matching neither
/// preference are dropped. Without one, every endpoint is primary.
fn classify(
    ring: &[TokenRange],
    primary_dc: &str,
    backup_dc: &str,
    primary: &mut BTreeSet<String>,
    backup: &mut BTreeSet<String>,
) {
    for range in ring {
        for endpoint in &range.endpoint_details {
            if primary_dc.is_empty() {
                primary.insert(endpoint.host.clone());
            } else {
                if endpoint.datacenter == backup_dc {
                    backup.insert(endpoint.host.clone());
                }
                if endpoint.datacenter == primary_dc {
                    primary.insert(endpoint.host.clone());
                }
            }
        }
    }
}
