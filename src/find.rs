use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use http::Request;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::Client;
use serde::Deserialize;

use crate::kubemodel::{ObjectKind, ObjectRef};

/// Verbs a kind must support before we will scan or delete its instances
const REQUIRED_VERBS: [&str; 3] = ["get", "list", "delete"];

#[derive(Debug, Deserialize)]
struct AnyObjectMeta {
    name: String,
    namespace: Option<String>,
    #[serde(rename = "creationTimestamp")]
    creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AnyObject {
    metadata: AnyObjectMeta,
}

#[derive(Debug, Deserialize)]
struct AnyObjectList {
    #[serde(default)]
    items: Vec<AnyObject>,
}

fn is_collectable(resource: &APIResource) -> bool {
    REQUIRED_VERBS
        .iter()
        .all(|verb| resource.verbs.iter().any(|have| have == verb))
}

/// Builds eligible kinds out of one discovery entry. `group_version` is
/// either `group/version` or a bare core version; in the latter case the
/// group comes from the per-resource field.
fn eligible_kinds(group_version: &str, resources: &[APIResource]) -> Vec<ObjectKind> {
    let (group, version) = match group_version.split_once('/') {
        Some((group, version)) => (Some(group.to_owned()), version),
        None => (None, group_version),
    };
    resources
        .iter()
        .filter(|resource| !resource.name.contains('/') && is_collectable(resource))
        .map(|resource| ObjectKind {
            group: group
                .clone()
                .or_else(|| resource.group.clone())
                .unwrap_or_default(),
            version: version.to_owned(),
            plural: resource.name.clone(),
            kind: resource.kind.clone(),
        })
        .collect()
}

/// Enumerates every kind the server currently serves that supports get, list
/// and delete. Walks the core API versions plus the preferred version of each
/// group. Any failure here is fatal to the cycle; no partial kind list is
/// returned.
pub async fn server_kinds(client: &Client) -> kube::Result<Vec<ObjectKind>> {
    let mut out = Vec::new();

    for version in client.list_core_api_versions().await?.versions {
        let resources = client.list_core_api_resources(&version).await?.resources;
        out.extend(eligible_kinds(&version, &resources));
    }

    for group in client.list_api_groups().await?.groups {
        let Some(version) = group.preferred_version.as_ref().or_else(|| group.versions.last())
        else {
            continue;
        };
        let resources = client
            .list_api_group_resources(&version.group_version)
            .await?
            .resources;
        out.extend(eligible_kinds(&version.group_version, &resources));
    }

    Ok(out)
}

/// Finds, cluster-wide, every object of the given kinds carrying the label
/// key. Listing matches on key presence only; the value is interpreted later
/// when expiry is evaluated.
pub async fn find_labeled(
    client: &Client,
    kinds: &[ObjectKind],
    label: &str,
) -> BTreeSet<ObjectRef> {
    log::info!("fetching objects labeled [{}]", label);
    let mut out = BTreeSet::new();
    for kind in kinds {
        merge_listed(&mut out, kind, list_kind(client, kind, label).await);
    }
    out
}

async fn list_kind(
    client: &Client,
    kind: &ObjectKind,
    label: &str,
) -> kube::Result<AnyObjectList> {
    let request = Request::builder()
        .uri(format!("{}?labelSelector={}", kind.collection_url(), label))
        .body(vec![])
        .map_err(kube::Error::HttpError)?;
    client.request::<AnyObjectList>(request).await
}

/// Folds one kind's list outcome into the running set. A failed or
/// inaccessible kind is logged and skipped so the remaining kinds still get
/// scanned.
fn merge_listed(
    out: &mut BTreeSet<ObjectRef>,
    kind: &ObjectKind,
    listed: kube::Result<AnyObjectList>,
) {
    match listed {
        Ok(list) => {
            for item in list.items {
                out.insert(ObjectRef {
                    kind: kind.clone(),
                    name: item.metadata.name,
                    namespace: item.metadata.namespace,
                    created: item.metadata.creation_timestamp,
                    labels: item.metadata.labels,
                });
            }
        }
        Err(err) => log::warn!("failed to list {}: {}", kind, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;
    use serde_json::json;

    fn api_resource(name: &str, kind: &str, verbs: &[&str]) -> APIResource {
        APIResource {
            name: name.to_owned(),
            kind: kind.to_owned(),
            verbs: verbs.iter().map(|verb| (*verb).to_owned()).collect(),
            ..APIResource::default()
        }
    }

    #[test]
    fn kinds_missing_a_required_verb_are_excluded() {
        let resources = [
            api_resource("deployments", "Deployment", &["get", "list", "delete", "watch"]),
            api_resource("tokenreviews", "TokenReview", &["create"]),
            api_resource("componentstatuses", "ComponentStatus", &["get", "list"]),
        ];
        let kinds = eligible_kinds("apps/v1", &resources);
        assert_eq!(kinds.len(), 1);
        assert_eq!(kinds[0].plural, "deployments");
    }

    #[test]
    fn subresources_are_excluded() {
        let resources = [
            api_resource("deployments/status", "Deployment", &["get", "list", "delete"]),
            api_resource("deployments", "Deployment", &["get", "list", "delete"]),
        ];
        let kinds = eligible_kinds("apps/v1", &resources);
        assert_eq!(kinds.len(), 1);
        assert_eq!(kinds[0].plural, "deployments");
    }

    #[test]
    fn group_version_string_splits() {
        let resources = [api_resource("jobs", "Job", &["get", "list", "delete"])];
        let kinds = eligible_kinds("batch/v1", &resources);
        assert_eq!(kinds[0].group, "batch");
        assert_eq!(kinds[0].version, "v1");
    }

    #[test]
    fn bare_core_version_takes_group_from_resource() {
        let mut with_group = api_resource("events", "Event", &["get", "list", "delete"]);
        with_group.group = Some("events.k8s.io".to_owned());
        let resources = [
            api_resource("configmaps", "ConfigMap", &["get", "list", "delete"]),
            with_group,
        ];
        let kinds = eligible_kinds("v1", &resources);
        assert_eq!(kinds[0].group, "");
        assert_eq!(kinds[0].version, "v1");
        assert_eq!(kinds[1].group, "events.k8s.io");
    }

    #[test]
    fn decodes_minimal_object_list() {
        let list: AnyObjectList = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMapList",
            "items": [
                {
                    "metadata": {
                        "name": "full",
                        "namespace": "default",
                        "creationTimestamp": "2024-01-01T00:00:00Z",
                        "labels": { "kube-custodian/ttl": "1d" }
                    }
                },
                { "metadata": { "name": "bare" } }
            ]
        }))
        .unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].metadata.name, "full");
        assert!(list.items[0].metadata.creation_timestamp.is_some());
        assert!(list.items[1].metadata.namespace.is_none());
        assert!(list.items[1].metadata.labels.is_empty());
    }

    #[test]
    fn absent_items_decode_as_empty() {
        let list: AnyObjectList = serde_json::from_value(json!({ "kind": "List" })).unwrap();
        assert!(list.items.is_empty());
    }

    #[test]
    fn one_failed_kind_does_not_hide_the_others() {
        let good = ObjectKind {
            group: String::new(),
            version: "v1".to_owned(),
            plural: "configmaps".to_owned(),
            kind: "ConfigMap".to_owned(),
        };
        let broken = ObjectKind {
            group: "metrics.k8s.io".to_owned(),
            version: "v1beta1".to_owned(),
            plural: "podmetrics".to_owned(),
            kind: "PodMetrics".to_owned(),
        };

        let mut out = BTreeSet::new();
        merge_listed(
            &mut out,
            &good,
            Ok(AnyObjectList {
                items: vec![AnyObject {
                    metadata: AnyObjectMeta {
                        name: "cfg".to_owned(),
                        namespace: Some("default".to_owned()),
                        creation_timestamp: None,
                        labels: BTreeMap::new(),
                    },
                }],
            }),
        );
        merge_listed(
            &mut out,
            &broken,
            Err(kube::Error::Api(ErrorResponse {
                status: "Failure".to_owned(),
                message: "forbidden".to_owned(),
                reason: "Forbidden".to_owned(),
                code: 403,
            })),
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out.iter().next().unwrap().name, "cfg");
    }
}
