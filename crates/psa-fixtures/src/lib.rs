//! Pod Security Admission test fixtures.
//!
//! Helpers that drive a management server into the states PSA validation
//! needs: PSA label sets, cluster-wide PSA configuration templates, the
//! `namespaces-psa` role template, and deployments whose admission outcome
//! reveals the active policy.
//!
//! Every operation takes a [`api::ManagementApi`] so the fixtures can run
//! against a real server client or [`api::mock::MockManagementApi`].

pub mod api;
pub mod cluster;
pub mod errors;
pub mod labels;
pub mod roles;
pub mod workloads;

pub use api::{ApiError, ManagementApi, Project, RoleTemplate};
pub use cluster::{edit_psact_cluster, ClusterKind};
pub use errors::PsaError;
pub use labels::{
    delete_psa_labels, expected_psa_labels, generate_psa_labels, psa_labels_from_namespace,
    PsaPolicy,
};
pub use roles::{create_role, create_update_psa_role_template, ROLE_TEMPLATE_POLICY};
pub use workloads::{
    create_deployment_and_wait, create_project, get_namespace, random_name, DEPLOYMENT_POLICY,
};
