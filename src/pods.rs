use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams};
use kube::{Client, ResourceExt};

/// Phases after which a pod will never progress again
const TERMINAL_PHASES: [&str; 2] = ["Failed", "Succeeded"];

fn is_terminal(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .is_some_and(|phase| TERMINAL_PHASES.contains(&phase))
}

/// Deletes every pod stuck in a terminal phase, across all namespaces.
/// Failing to list pods at all is fatal; individual deletions are logged
/// and skipped.
pub async fn sweep_terminal(client: &Client) -> kube::Result<()> {
    log::info!("fetching all pods");
    let pods: Api<Pod> = Api::all(client.clone());
    let terminal: Vec<Pod> = pods
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter(is_terminal)
        .collect();

    if terminal.is_empty() {
        log::info!("no pods need to be cleaned");
        return Ok(());
    }

    log::info!("deleting {} terminal pods", terminal.len());
    for pod in &terminal {
        let name = pod.name_any();
        let namespace = pod.namespace().unwrap_or_default();
        let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => log::debug!("deleted pod {}/{}", namespace, name),
            Err(err) => log::error!("failed to delete pod {}/{}: {}", namespace, name, err),
        }
    }
    Ok(())
}
