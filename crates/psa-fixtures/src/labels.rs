//! Pod Security Admission namespace labels.

use k8s_openapi::api::core::v1::Namespace;
use std::collections::BTreeMap;

/// Prefix shared by every PSA label.
pub const PSA_LABEL_PREFIX: &str = "pod-security.kubernetes.io/";

pub const PSA_ENFORCE_LABEL: &str = "pod-security.kubernetes.io/enforce";
pub const PSA_ENFORCE_VERSION_LABEL: &str = "pod-security.kubernetes.io/enforce-version";
pub const PSA_WARN_LABEL: &str = "pod-security.kubernetes.io/warn";
pub const PSA_WARN_VERSION_LABEL: &str = "pod-security.kubernetes.io/warn-version";
pub const PSA_AUDIT_LABEL: &str = "pod-security.kubernetes.io/audit";
pub const PSA_AUDIT_VERSION_LABEL: &str = "pod-security.kubernetes.io/audit-version";

/// Version label value tracking the cluster's Kubernetes version.
pub const PSA_LATEST_VERSION: &str = "latest";

/// Pod Security Standards policy levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsaPolicy {
    Privileged,
    Baseline,
    Restricted,
}

impl PsaPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            PsaPolicy::Privileged => "privileged",
            PsaPolicy::Baseline => "baseline",
            PsaPolicy::Restricted => "restricted",
        }
    }
}

/// Labels enforcing, warning and auditing at `privileged`, all at `latest`.
pub fn generate_psa_labels() -> BTreeMap<String, String> {
    let policy = PsaPolicy::Privileged.as_str();

    [
        (PSA_ENFORCE_LABEL, policy),
        (PSA_ENFORCE_VERSION_LABEL, PSA_LATEST_VERSION),
        (PSA_WARN_LABEL, policy),
        (PSA_WARN_VERSION_LABEL, PSA_LATEST_VERSION),
        (PSA_AUDIT_LABEL, policy),
        (PSA_AUDIT_VERSION_LABEL, PSA_LATEST_VERSION),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// PSA labels currently set on a namespace.
pub fn psa_labels_from_namespace(namespace: &Namespace) -> BTreeMap<String, String> {
    namespace
        .metadata
        .labels
        .iter()
        .flatten()
        .filter(|(key, _)| key.contains(PSA_LABEL_PREFIX))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Remove enforce, warn and audit labels along with their `-version` labels.
pub fn delete_psa_labels(labels: &mut BTreeMap<String, String>) {
    labels.retain(|key, _| {
        !(key.contains(PSA_WARN_LABEL)
            || key.contains(PSA_AUDIT_LABEL)
            || key.contains(PSA_ENFORCE_LABEL))
    });
}

/// Values from `actual` for every key that `observed` also carries.
pub fn expected_psa_labels(
    observed: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    observed
        .keys()
        .filter_map(|key| actual.get(key).map(|value| (key.clone(), value.clone())))
        .collect()
}
