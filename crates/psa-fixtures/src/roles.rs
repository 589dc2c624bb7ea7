//! Role templates granting PSA label management.

use crate::api::{ApiError, ManagementApi, RoleTemplate};
use crate::errors::PsaError;
use common::poll::{poll_until, PollError, PollPolicy};
use k8s_openapi::api::rbac::v1::PolicyRule;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const PSA_ROLE_TEMPLATE_NAME: &str = "namespaces-psa";
pub const PSA_ROLE_DISPLAY_NAME: &str = "Manage PSA Labels";

/// Verb that lets a project member edit namespace PSA labels.
pub const UPDATE_PSA_VERB: &str = "updatepsa";
pub const MANAGEMENT_API_GROUP: &str = "management.cattle.io";
pub const PROJECT_RESOURCE: &str = "projects";
pub const PROJECT_CONTEXT: &str = "project";
pub const CLUSTER_CONTEXT: &str = "cluster";

/// Polls for role template deletion and creation: every 500ms for 10s.
pub const ROLE_TEMPLATE_POLICY: PollPolicy =
    PollPolicy::new(Duration::from_millis(500), Duration::from_secs(10)).delayed();

/// The single rule carried by the PSA role template.
pub fn update_psa_rule() -> PolicyRule {
    PolicyRule {
        verbs: vec![UPDATE_PSA_VERB.to_string()],
        api_groups: Some(vec![MANAGEMENT_API_GROUP.to_string()]),
        resources: Some(vec![PROJECT_RESOURCE.to_string()]),
        ..PolicyRule::default()
    }
}

/// Create a role template with the given context, name and rules.
///
/// # Errors
///
/// Returns `PsaError::Api` if the management API rejects the template.
pub async fn create_role(
    api: &dyn ManagementApi,
    context: &str,
    name: &str,
    rules: Vec<PolicyRule>,
) -> Result<RoleTemplate, PsaError> {
    let template = RoleTemplate {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        context: context.to_string(),
        display_name: String::new(),
        rules,
        external: false,
    };

    Ok(api.create_role_template(&template).await?)
}

/// Recreate the `namespaces-psa` role template from scratch.
///
/// Any existing template is deleted first; the new one is returned once a
/// GET sees it.
///
/// # Errors
///
/// - `PsaError::Api` - delete, create or the confirming GET failed
/// - `PsaError::Timeout` - deletion or creation did not settle in time
#[instrument(skip_all, fields(name = PSA_ROLE_TEMPLATE_NAME))]
pub async fn create_update_psa_role_template(
    api: &dyn ManagementApi,
    policy: PollPolicy,
) -> Result<RoleTemplate, PsaError> {
    poll_until(policy, move || async move {
        match api.get_role_template(PSA_ROLE_TEMPLATE_NAME).await {
            Err(e) if e.is_not_found() => return Ok(true),
            Err(e) => {
                debug!(target: "psa.roles", error = %e, "Role template lookup failed");
            }
            Ok(_) => {}
        }

        api.delete_role_template(PSA_ROLE_TEMPLATE_NAME)
            .await
            .map(|()| false)
    })
    .await
    .map_err(|e| poll_error(e, "role template deletion"))?;

    let template = RoleTemplate {
        metadata: ObjectMeta {
            name: Some(PSA_ROLE_TEMPLATE_NAME.to_string()),
            ..ObjectMeta::default()
        },
        context: PROJECT_CONTEXT.to_string(),
        display_name: PSA_ROLE_DISPLAY_NAME.to_string(),
        rules: vec![update_psa_rule()],
        external: false,
    };

    let created = api.create_role_template(&template).await?;

    poll_until(policy, move || async move {
        api.get_role_template(PSA_ROLE_TEMPLATE_NAME)
            .await
            .map(|_| true)
    })
    .await
    .map_err(|e| poll_error(e, "role template creation"))?;

    info!(target: "psa.roles", "PSA role template ready");

    Ok(created)
}

fn poll_error(err: PollError<ApiError>, what: &str) -> PsaError {
    match err {
        PollError::Timeout(timeout) => PsaError::Timeout {
            what: what.to_string(),
            timeout,
        },
        PollError::Condition(e) => PsaError::Api(e),
    }
}
