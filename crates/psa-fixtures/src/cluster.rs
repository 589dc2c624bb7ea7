//! Cluster-level PSA configuration template (PSACT) edits.

use crate::api::ManagementApi;
use crate::errors::PsaError;
use tracing::{debug, info};

/// Management cluster IDs of provisioning-v2 clusters carry this marker.
pub const PROVISIONING_CLUSTER_MARKER: &str = "c-m-";

/// RKE1 clusters ignore an empty PSACT, so clearing one sends a blank.
const RKE1_EMPTY_PSACT: &str = " ";

/// Distribution family of a downstream cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterKind {
    /// Provisioning-v2 cluster, edited through its provisioning object.
    Rke2K3s,
    /// Legacy cluster, edited through the management cluster object.
    Rke1,
}

impl ClusterKind {
    pub fn from_cluster_id(cluster_id: &str) -> Self {
        if cluster_id.contains(PROVISIONING_CLUSTER_MARKER) {
            ClusterKind::Rke2K3s
        } else {
            ClusterKind::Rke1
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClusterKind::Rke2K3s => "RKE2K3S",
            ClusterKind::Rke1 => "RKE",
        }
    }
}

/// Set a cluster's default PSACT and verify it took effect.
///
/// An empty `psact` clears the template.
///
/// # Errors
///
/// - `PsaError::Api` - a management call failed
/// - `PsaError::PsactNotChanged` - the re-read value differs from `psact`
pub async fn edit_psact_cluster(
    api: &dyn ManagementApi,
    cluster_name: &str,
    namespace: &str,
    psact: &str,
) -> Result<ClusterKind, PsaError> {
    let cluster_id = api.cluster_id_by_name(cluster_name).await?;
    let kind = ClusterKind::from_cluster_id(&cluster_id);

    debug!(
        target: "psa.cluster",
        cluster = %cluster_name,
        cluster_id = %cluster_id,
        kind = kind.as_str(),
        psact = %psact,
        "Editing cluster PSACT"
    );

    let actual = match kind {
        ClusterKind::Rke2K3s => {
            api.set_provisioning_cluster_psact(namespace, cluster_name, psact)
                .await?;
            api.provisioning_cluster_psact(namespace, cluster_name).await?
        }
        ClusterKind::Rke1 => {
            let sent = if psact.is_empty() { RKE1_EMPTY_PSACT } else { psact };
            api.set_management_cluster_psact(&cluster_id, sent).await?;
            api.wait_for_active_cluster(&cluster_id).await?;
            api.management_cluster_psact(&cluster_id).await?
        }
    };

    if actual != psact {
        return Err(PsaError::PsactNotChanged {
            expected: psact.to_string(),
            actual,
        });
    }

    info!(
        target: "psa.cluster",
        cluster = %cluster_name,
        kind = kind.as_str(),
        "Cluster PSACT updated"
    );

    Ok(kind)
}
