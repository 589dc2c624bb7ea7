//! Management API seam used by the PSA fixtures.
//!
//! The fixtures never talk to a cluster directly; callers inject an
//! implementation of [`ManagementApi`] backed by their management server
//! client. [`mock::MockManagementApi`] is an in-memory implementation for
//! tests.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::PolicyRule;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a management API implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("Request failed: {0}")]
    Request(String),
}

impl ApiError {
    pub fn not_found(kind: &str, name: &str) -> Self {
        ApiError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Management role template (`management.cattle.io/v3`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplate {
    pub metadata: ObjectMeta,

    /// `cluster` or `project`.
    #[serde(default)]
    pub context: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub rules: Vec<PolicyRule>,

    #[serde(default)]
    pub external: bool,
}

impl RoleTemplate {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}

/// Management project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Assigned by the server, `<cluster>:<project>`.
    #[serde(default)]
    pub id: Option<String>,

    pub cluster_id: String,

    pub name: String,
}

/// Management operations the fixtures depend on.
#[async_trait::async_trait]
pub trait ManagementApi: Send + Sync {
    /// Resolve a cluster's management ID from its display name.
    async fn cluster_id_by_name(&self, cluster_name: &str) -> Result<String, ApiError>;

    /// PSA config template name on a provisioning (RKE2/K3s) cluster.
    async fn provisioning_cluster_psact(
        &self,
        namespace: &str,
        cluster_name: &str,
    ) -> Result<String, ApiError>;

    async fn set_provisioning_cluster_psact(
        &self,
        namespace: &str,
        cluster_name: &str,
        psact: &str,
    ) -> Result<(), ApiError>;

    /// PSA config template name on a management (RKE1) cluster.
    async fn management_cluster_psact(&self, cluster_id: &str) -> Result<String, ApiError>;

    async fn set_management_cluster_psact(
        &self,
        cluster_id: &str,
        psact: &str,
    ) -> Result<(), ApiError>;

    /// Block until a management cluster reports active.
    async fn wait_for_active_cluster(&self, cluster_id: &str) -> Result<(), ApiError>;

    /// Fetch a role template; `ApiError::NotFound` when absent.
    async fn get_role_template(&self, name: &str) -> Result<RoleTemplate, ApiError>;

    async fn delete_role_template(&self, name: &str) -> Result<(), ApiError>;

    async fn create_role_template(&self, template: &RoleTemplate)
        -> Result<RoleTemplate, ApiError>;

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ApiError>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ApiError>;

    async fn create_project(&self, project: &Project) -> Result<Project, ApiError>;

    async fn get_namespace(&self, name: &str) -> Result<Namespace, ApiError>;
}

/// In-memory management API for testing.
pub mod mock {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct MockCluster {
        id: String,
        psact: String,
    }

    #[derive(Debug, Default)]
    struct MockState {
        clusters: HashMap<String, MockCluster>,
        role_templates: HashMap<String, RoleTemplate>,
        /// GETs that still report a deleted role template.
        pending_deletes: HashMap<String, usize>,
        deployments: HashMap<(String, String), Deployment>,
        deployment_gets: usize,
        projects: Vec<Project>,
        namespaces: HashMap<String, Namespace>,
        calls: Vec<String>,
    }

    /// Scriptable in-memory management API.
    #[derive(Debug, Default)]
    pub struct MockManagementApi {
        state: Mutex<MockState>,
        /// Accept PSACT updates without applying them.
        ignore_psact_updates: bool,
        /// GETs a deleted role template keeps showing up for.
        delete_lag: usize,
        /// GETs before a created deployment reports all replicas available.
        ready_after_gets: usize,
        /// Condition message attached to every fetched deployment.
        deployment_condition: Option<String>,
    }

    impl MockManagementApi {
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn with_cluster(self, name: &str, id: &str, psact: &str) -> Self {
            if let Ok(mut state) = self.state.lock() {
                state.clusters.insert(
                    name.to_string(),
                    MockCluster {
                        id: id.to_string(),
                        psact: psact.to_string(),
                    },
                );
            }
            self
        }

        #[must_use]
        pub fn with_role_template(self, template: RoleTemplate) -> Self {
            if let Ok(mut state) = self.state.lock() {
                state
                    .role_templates
                    .insert(template.name().to_string(), template);
            }
            self
        }

        #[must_use]
        pub fn with_namespace(self, namespace: Namespace) -> Self {
            if let Ok(mut state) = self.state.lock() {
                let name = namespace.metadata.name.clone().unwrap_or_default();
                state.namespaces.insert(name, namespace);
            }
            self
        }

        #[must_use]
        pub fn ignoring_psact_updates(mut self) -> Self {
            self.ignore_psact_updates = true;
            self
        }

        #[must_use]
        pub fn with_delete_lag(mut self, gets: usize) -> Self {
            self.delete_lag = gets;
            self
        }

        #[must_use]
        pub fn with_ready_after(mut self, gets: usize) -> Self {
            self.ready_after_gets = gets;
            self
        }

        #[must_use]
        pub fn with_deployment_condition(mut self, message: &str) -> Self {
            self.deployment_condition = Some(message.to_string());
            self
        }

        /// Every call made so far, as `operation:argument`.
        pub fn calls(&self) -> Vec<String> {
            self.state
                .lock()
                .map(|s| s.calls.clone())
                .unwrap_or_default()
        }

        pub fn projects(&self) -> Vec<Project> {
            self.state
                .lock()
                .map(|s| s.projects.clone())
                .unwrap_or_default()
        }

        pub fn role_template(&self, name: &str) -> Option<RoleTemplate> {
            self.state
                .lock()
                .ok()
                .and_then(|s| s.role_templates.get(name).cloned())
        }

        fn with_state<T>(
            &self,
            call: String,
            f: impl FnOnce(&mut MockState) -> Result<T, ApiError>,
        ) -> Result<T, ApiError> {
            let mut state = self
                .state
                .lock()
                .map_err(|_| ApiError::Request("mock state poisoned".to_string()))?;
            state.calls.push(call);
            f(&mut state)
        }

        fn cluster_by_id<'a>(
            state: &'a mut MockState,
            cluster_id: &str,
        ) -> Result<&'a mut MockCluster, ApiError> {
            state
                .clusters
                .values_mut()
                .find(|c| c.id == cluster_id)
                .ok_or_else(|| ApiError::not_found("cluster", cluster_id))
        }
    }

    #[async_trait::async_trait]
    impl ManagementApi for MockManagementApi {
        async fn cluster_id_by_name(&self, cluster_name: &str) -> Result<String, ApiError> {
            self.with_state(format!("cluster_id_by_name:{cluster_name}"), |state| {
                state
                    .clusters
                    .get(cluster_name)
                    .map(|c| c.id.clone())
                    .ok_or_else(|| ApiError::not_found("cluster", cluster_name))
            })
        }

        async fn provisioning_cluster_psact(
            &self,
            _namespace: &str,
            cluster_name: &str,
        ) -> Result<String, ApiError> {
            self.with_state(format!("provisioning_cluster_psact:{cluster_name}"), |state| {
                state
                    .clusters
                    .get(cluster_name)
                    .map(|c| c.psact.clone())
                    .ok_or_else(|| ApiError::not_found("cluster", cluster_name))
            })
        }

        async fn set_provisioning_cluster_psact(
            &self,
            _namespace: &str,
            cluster_name: &str,
            psact: &str,
        ) -> Result<(), ApiError> {
            let ignore = self.ignore_psact_updates;
            self.with_state(
                format!("set_provisioning_cluster_psact:{psact}"),
                |state| {
                    let cluster = state
                        .clusters
                        .get_mut(cluster_name)
                        .ok_or_else(|| ApiError::not_found("cluster", cluster_name))?;
                    if !ignore {
                        cluster.psact = psact.to_string();
                    }
                    Ok(())
                },
            )
        }

        async fn management_cluster_psact(&self, cluster_id: &str) -> Result<String, ApiError> {
            self.with_state(format!("management_cluster_psact:{cluster_id}"), |state| {
                Self::cluster_by_id(state, cluster_id).map(|c| c.psact.clone())
            })
        }

        async fn set_management_cluster_psact(
            &self,
            cluster_id: &str,
            psact: &str,
        ) -> Result<(), ApiError> {
            let ignore = self.ignore_psact_updates;
            self.with_state(format!("set_management_cluster_psact:{psact}"), |state| {
                let cluster = Self::cluster_by_id(state, cluster_id)?;
                if !ignore {
                    // The management API stores a blank value as empty
                    cluster.psact = psact.trim().to_string();
                }
                Ok(())
            })
        }

        async fn wait_for_active_cluster(&self, cluster_id: &str) -> Result<(), ApiError> {
            self.with_state(format!("wait_for_active_cluster:{cluster_id}"), |state| {
                Self::cluster_by_id(state, cluster_id).map(|_| ())
            })
        }

        async fn get_role_template(&self, name: &str) -> Result<RoleTemplate, ApiError> {
            self.with_state(format!("get_role_template:{name}"), |state| {
                if let Some(remaining) = state.pending_deletes.get_mut(name) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Ok(RoleTemplate {
                            metadata: ObjectMeta {
                                name: Some(name.to_string()),
                                ..ObjectMeta::default()
                            },
                            ..RoleTemplate::default()
                        });
                    }
                    state.pending_deletes.remove(name);
                }
                state
                    .role_templates
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found("roletemplate", name))
            })
        }

        async fn delete_role_template(&self, name: &str) -> Result<(), ApiError> {
            let lag = self.delete_lag;
            self.with_state(format!("delete_role_template:{name}"), |state| {
                if state.role_templates.remove(name).is_some() && lag > 0 {
                    state.pending_deletes.insert(name.to_string(), lag);
                }
                Ok(())
            })
        }

        async fn create_role_template(
            &self,
            template: &RoleTemplate,
        ) -> Result<RoleTemplate, ApiError> {
            self.with_state(
                format!("create_role_template:{}", template.name()),
                |state| {
                    if state.role_templates.contains_key(template.name()) {
                        return Err(ApiError::Request(format!(
                            "roletemplate {} already exists",
                            template.name()
                        )));
                    }
                    state
                        .role_templates
                        .insert(template.name().to_string(), template.clone());
                    Ok(template.clone())
                },
            )
        }

        async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ApiError> {
            let namespace = deployment.metadata.namespace.clone().unwrap_or_default();
            let name = deployment.metadata.name.clone().unwrap_or_default();
            self.with_state(format!("create_deployment:{namespace}/{name}"), |state| {
                state
                    .deployments
                    .insert((namespace, name), deployment.clone());
                Ok(deployment.clone())
            })
        }

        async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ApiError> {
            let ready_after = self.ready_after_gets;
            let condition = self.deployment_condition.clone();
            self.with_state(format!("get_deployment:{namespace}/{name}"), |state| {
                state.deployment_gets += 1;
                let gets = state.deployment_gets;
                let mut deployment = state
                    .deployments
                    .get(&(namespace.to_string(), name.to_string()))
                    .cloned()
                    .ok_or_else(|| ApiError::not_found("deployment", name))?;

                let desired = deployment
                    .spec
                    .as_ref()
                    .and_then(|s| s.replicas)
                    .unwrap_or(1);
                deployment.status = Some(DeploymentStatus {
                    available_replicas: Some(if gets > ready_after { desired } else { 0 }),
                    conditions: condition.map(|message| {
                        vec![DeploymentCondition {
                            type_: "ReplicaFailure".to_string(),
                            status: "True".to_string(),
                            message: Some(message),
                            ..DeploymentCondition::default()
                        }]
                    }),
                    ..DeploymentStatus::default()
                });
                Ok(deployment)
            })
        }

        async fn create_project(&self, project: &Project) -> Result<Project, ApiError> {
            self.with_state(format!("create_project:{}", project.name), |state| {
                let mut created = project.clone();
                created.id = Some(format!(
                    "{}:p-{}",
                    project.cluster_id,
                    state.projects.len() + 1
                ));
                state.projects.push(created.clone());
                Ok(created)
            })
        }

        async fn get_namespace(&self, name: &str) -> Result<Namespace, ApiError> {
            self.with_state(format!("get_namespace:{name}"), |state| {
                state
                    .namespaces
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found("namespace", name))
            })
        }
    }
}
