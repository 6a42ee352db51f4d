use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use http::Request;
use kube::api::DeleteParams;
use kube::Client;
use thiserror::Error;

use crate::expire::{self, Expiry};
use crate::find;
use crate::kubemodel::ObjectRef;

#[derive(Debug, Error)]
pub enum CycleError {
    /// Without a full view of the server's kinds the cycle cannot proceed;
    /// the top-level loop turns this into process termination
    #[error("failed to discover api resources: {0}")]
    Discovery(#[source] kube::Error),
}

/// Runs one full garbage-collection cycle: discover kinds, gather objects
/// carrying either policy label, evaluate them at a single instant, delete
/// the expired ones.
///
/// Discovery runs once per cycle even though two labels are scanned, since
/// its result does not depend on the label. A failed deletion is not retried
/// here; the object still matches its policy next cycle and is picked up
/// again.
pub async fn run_cycle(client: &Client) -> Result<(), CycleError> {
    log::info!("fetching api resources");
    let kinds = find::server_kinds(client)
        .await
        .map_err(CycleError::Discovery)?;

    let mut candidates = BTreeSet::new();
    for label in expire::POLICY_LABELS {
        candidates.extend(find::find_labeled(client, &kinds, label).await);
    }
    if candidates.is_empty() {
        log::info!("no labeled objects found");
        return Ok(());
    }

    log::info!("evaluating {} labeled objects", candidates.len());
    let expired = expired_objects(&candidates, Utc::now());
    if expired.is_empty() {
        log::info!("no objects need to be cleaned");
        return Ok(());
    }

    log::info!("found {} expired objects", expired.len());
    let mut deleted = 0usize;
    for obj in expired {
        match delete_object(client, obj).await {
            Ok(()) => {
                log::info!("deleted {}", obj);
                deleted += 1;
            }
            Err(err) => log::error!("failed to delete {}: {}", obj, err),
        }
    }
    log::info!("deleted {} expired objects", deleted);
    Ok(())
}

/// Keeps only the candidates whose policy has elapsed at `now`. Evaluation
/// reads nothing but each object's own snapshot.
fn expired_objects(candidates: &BTreeSet<ObjectRef>, now: DateTime<Utc>) -> Vec<&ObjectRef> {
    candidates
        .iter()
        .filter(|obj| expire::evaluate(obj, now) == Expiry::Expired)
        .collect()
}

async fn delete_object(client: &Client, obj: &ObjectRef) -> kube::Result<()> {
    let request = Request::delete(obj.url())
        .header("Accept", "application/json")
        .body(serde_json::to_vec(&DeleteParams::default()).map_err(kube::Error::SerdeError)?)
        .map_err(kube::Error::HttpError)?;
    let _status: serde_json::Value = client.request(request).await?;
    Ok(())
}
