use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

use chrono::{DateTime, Utc};

/// Identifies one deletable object kind discovered on the server
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectKind {
    /// Empty for the legacy core group
    pub group: String,
    pub version: String,
    /// Lowercase plural used in API paths, e.g. `deployments`
    pub plural: String,
    pub kind: String,
}

impl ObjectKind {
    /// Cluster-wide collection path: `/api/v1/pods` for the core group,
    /// `/apis/apps/v1/deployments` otherwise
    pub fn collection_url(&self) -> String {
        format!("{}/{}", self.group_version_base(), self.plural)
    }

    fn group_version_base(&self) -> String {
        if self.group.is_empty() {
            format!("/api/{}", self.version)
        } else {
            format!("/apis/{}/{}", self.group, self.version)
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.plural)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.plural)
        }
    }
}

/// Snapshot of one object instance taken while listing. Never mutated;
/// each cycle produces fresh snapshots.
#[derive(Clone, Debug)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
    /// `None` for cluster-scoped objects
    pub namespace: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
}

impl ObjectRef {
    /// Path of the object itself, used for deletion
    pub fn url(&self) -> String {
        let ns_prefix = self
            .namespace
            .as_ref()
            .map(|ns| format!("namespaces/{}/", ns))
            .unwrap_or_default();

        format!(
            "{}/{}{}/{}",
            self.kind.group_version_base(),
            ns_prefix,
            self.kind.plural,
            self.name,
        )
    }

    fn identity(&self) -> (&ObjectKind, Option<&str>, &str) {
        (&self.kind, self.namespace.as_deref(), &self.name)
    }
}

// Identity is (group, version, plural, namespace, name); the label and
// timestamp payload does not participate in set membership.
impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}
impl Eq for ObjectRef {}
impl PartialOrd for ObjectRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ObjectRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)?;
        if let Some(ns) = &self.namespace {
            write!(f, " in {}", ns)?;
        }
        Ok(())
    }
}
