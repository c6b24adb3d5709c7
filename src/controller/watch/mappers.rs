//! Event → reconcile-request mappers (`spec.md` §4.5).

use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::runtime::reflector::{ObjectRef, Store};

use crate::constants::BINDING_LABEL;
use crate::controller::binding::AcrBinding;
use crate::controller::naming;

/// Secret change → the one binding named by its label, or by legacy-name
/// extraction if unlabeled. `None` if the secret isn't binding-managed.
pub fn map_secret_to_binding<B: AcrBinding>(secret: &Secret) -> Option<ObjectRef<B>> {
    let namespace = secret.metadata.namespace.clone()?;
    let binding_name = secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(BINDING_LABEL))
        .cloned()
        .or_else(|| {
            let name = secret.metadata.name.as_deref()?;
            naming::binding_name_from_legacy(name).map(str::to_string)
        })?;
    Some(ObjectRef::new(&binding_name).within(&namespace))
}

/// ServiceAccount change → every binding in the same namespace whose
/// effective `serviceAccountName` equals the account's name.
pub fn map_service_account_to_bindings<B: AcrBinding>(
    store: &Store<B>,
    service_account: &ServiceAccount,
) -> Vec<ObjectRef<B>> {
    let Some(namespace) = service_account.metadata.namespace.clone() else {
        return Vec::new();
    };
    let Some(sa_name) = service_account.metadata.name.as_deref() else {
        return Vec::new();
    };

    store
        .state()
        .iter()
        .filter(|binding| binding.meta().namespace.as_deref() == Some(namespace.as_str()))
        .filter(|binding| binding.service_account_name() == sa_name)
        .filter_map(|binding| binding.meta().name.as_deref().map(|n| ObjectRef::new(n).within(&namespace)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn secret_with(name: &str, namespace: &str, label: Option<&str>) -> Secret {
        let mut labels = BTreeMap::new();
        if let Some(binding) = label {
            labels.insert(BINDING_LABEL.to_string(), binding.to_string());
        }
        Secret {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: if labels.is_empty() { None } else { Some(labels) },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn labeled_secret_maps_by_label() {
        let secret = secret_with("acr-pull-my-binding", "ns", Some("my-binding"));
        let binding_ref = map_secret_to_binding::<crate::crd::AcrPullBindingV1beta2>(&secret).unwrap();
        assert_eq!(binding_ref.name, "my-binding");
        assert_eq!(binding_ref.namespace.as_deref(), Some("ns"));
    }

    #[test]
    fn unlabeled_legacy_secret_maps_by_name() {
        let secret = secret_with("my-binding-msi-acrpull-secret", "ns", None);
        let binding_ref = map_secret_to_binding::<crate::crd::AcrPullBindingV1beta2>(&secret).unwrap();
        assert_eq!(binding_ref.name, "my-binding");
    }

    #[test]
    fn unrelated_secret_maps_to_none() {
        let secret = secret_with("unrelated", "ns", None);
        assert!(map_secret_to_binding::<crate::crd::AcrPullBindingV1beta2>(&secret).is_none());
    }
}
