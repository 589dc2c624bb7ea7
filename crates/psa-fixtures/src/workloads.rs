//! Workloads, projects and namespaces used to exercise PSA enforcement.

use crate::api::{ManagementApi, Project};
use crate::errors::PsaError;
use common::poll::{poll_until, PollError, PollPolicy};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, Namespace, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Label tying a deployment to its pods.
pub const WORKLOAD_SELECTOR_LABEL: &str = "workload.user.cattle.io/workloadselector";

/// Condition messages containing this mean admission rejected the pods.
const FORBIDDEN_MARKER: &str = "forbidden";

const RANDOM_SUFFIX_LEN: usize = 5;

/// Polls a new deployment every 5s for up to 5 minutes.
pub const DEPLOYMENT_POLICY: PollPolicy =
    PollPolicy::new(Duration::from_secs(5), Duration::from_secs(300)).delayed();

/// `prefix` followed by a short random lowercase suffix.
pub fn random_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let suffix: String = id.chars().take(RANDOM_SUFFIX_LEN).collect();
    format!("{prefix}{suffix}")
}

/// Single-container, single-replica deployment that always pulls `image`.
pub fn deployment_template(
    name: &str,
    namespace: &str,
    container_name: &str,
    image: &str,
) -> Deployment {
    let labels = BTreeMap::from([(
        WORKLOAD_SELECTOR_LABEL.to_string(),
        format!("apps.deployment-{namespace}-{name}"),
    )]);

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: container_name.to_string(),
                        image: Some(image.to_string()),
                        image_pull_policy: Some("Always".to_string()),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// Outcome of one readiness check.
fn deployment_ready(deployment: &Deployment) -> Result<bool, PsaError> {
    let status = deployment.status.as_ref();

    let forbidden = status
        .and_then(|s| s.conditions.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|c| c.message.as_deref())
        .find(|message| message.contains(FORBIDDEN_MARKER));
    if let Some(message) = forbidden {
        return Err(PsaError::Forbidden(message.to_string()));
    }

    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .ok_or_else(|| PsaError::InvalidDeployment("spec.replicas is unset".to_string()))?;
    let available = status.and_then(|s| s.available_replicas).unwrap_or(0);

    Ok(desired == available)
}

/// Create a deployment and wait until all its replicas are available.
///
/// # Errors
///
/// - `PsaError::Forbidden` - a deployment condition reports `forbidden`
/// - `PsaError::Api` - create or fetch failed
/// - `PsaError::InvalidDeployment` - the fetched object has no replica count
/// - `PsaError::Timeout` - replicas never became available
#[instrument(skip_all, fields(namespace = %namespace, image = %image))]
pub async fn create_deployment_and_wait(
    api: &dyn ManagementApi,
    container_name: &str,
    image: &str,
    namespace: &str,
    policy: PollPolicy,
) -> Result<Deployment, PsaError> {
    let name = random_name("rbac-");
    let template = deployment_template(&name, namespace, container_name, image);

    api.create_deployment(&template).await?;
    debug!(target: "psa.workloads", deployment = %name, "Deployment created");

    let latest = tokio::sync::Mutex::new(None);
    let latest_ref = &latest;
    let name_ref = name.as_str();

    let result = poll_until(policy, move || async move {
        let deployment = api.get_deployment(namespace, name_ref).await?;
        let ready = deployment_ready(&deployment)?;
        *latest_ref.lock().await = Some(deployment);
        Ok::<_, PsaError>(ready)
    })
    .await;

    match result {
        Ok(()) => {
            info!(target: "psa.workloads", deployment = %name, "Deployment available");
            latest
                .into_inner()
                .ok_or_else(|| PsaError::InvalidDeployment(format!("{name} was never fetched")))
        }
        Err(PollError::Condition(e)) => {
            warn!(target: "psa.workloads", deployment = %name, error = %e, "Deployment failed");
            Err(e)
        }
        Err(PollError::Timeout(timeout)) => Err(PsaError::Timeout {
            what: format!("deployment {namespace}/{name}"),
            timeout,
        }),
    }
}

/// Create a project with a random `testproject-` name in `cluster_id`.
///
/// # Errors
///
/// Returns `PsaError::Api` if the management API rejects the project.
pub async fn create_project(api: &dyn ManagementApi, cluster_id: &str) -> Result<Project, PsaError> {
    let project = Project {
        id: None,
        cluster_id: cluster_id.to_string(),
        name: random_name("testproject-"),
    };

    Ok(api.create_project(&project).await?)
}

/// Fetch a namespace as a typed object.
///
/// # Errors
///
/// Returns `PsaError::Api` if the namespace cannot be fetched.
pub async fn get_namespace(api: &dyn ManagementApi, namespace: &str) -> Result<Namespace, PsaError> {
    Ok(api.get_namespace(namespace).await?)
}
