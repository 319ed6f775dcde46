// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Operator actions against a live cluster.
//!
//! Each function is one manual step: apply, inspect, scale, promote or roll back.
//! Nothing here decides on its own when to promote or roll back.

use crate::constants::rollout::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::{labels, FIELD_MANAGER};
use crate::error::{CanaryError, Result};
use crate::manifests::Bundle;
use crate::traffic::BackendPool;
use crate::types::Release;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams},
    Api, Client, ResourceExt,
};
use serde_json::json;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument};

/// Desired and ready replicas of one release's Deployment
#[derive(Clone, Debug, PartialEq)]
pub struct TrackStatus {
    pub release: Release,
    pub name: String,
    pub desired: i32,
    pub ready: i32,
    pub image: Option<String>,
}

impl TrackStatus {
    pub fn is_ready(&self) -> bool {
        self.ready >= self.desired
    }
}

/// Backend pool formed by the ready pods only
pub fn ready_pool(statuses: &[TrackStatus]) -> BackendPool {
    let replicas: Vec<(Release, u32)> = statuses
        .iter()
        .map(|s| (s.release, u32::try_from(s.ready).unwrap_or(0)))
        .collect();
    BackendPool::from_replicas(&replicas)
}

/// Server-side apply the namespace, both Deployments and the Service
#[instrument(skip(client, bundle))]
pub async fn apply_bundle(client: &Client, namespace: &str, bundle: &Bundle) -> Result<()> {
    ensure_namespace(client, namespace).await?;

    let pp = PatchParams::apply(FIELD_MANAGER).force();

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    for deployment in [&bundle.stable, &bundle.canary] {
        let name = deployment.name_any();
        deployments
            .patch(&name, &pp, &Patch::Apply(deployment))
            .await?;
        info!("Applied deployment {}/{}", namespace, name);
    }

    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let name = bundle.service.name_any();
    services
        .patch(&name, &pp, &Patch::Apply(&bundle.service))
        .await?;
    info!("Applied service {}/{}", namespace, name);

    Ok(())
}

/// Apply the namespace object so a missing namespace is created and an existing one is untouched
async fn ensure_namespace(client: &Client, namespace: &str) -> Result<()> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": namespace },
    });

    namespaces
        .patch(
            namespace,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Apply(&ns),
        )
        .await?;
    debug!("Namespace {} is present", namespace);
    Ok(())
}

/// Status of every Deployment carrying the shared app label, ordered stable first
#[instrument(skip(client))]
pub async fn observed_split(client: &Client, namespace: &str) -> Result<Vec<TrackStatus>> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let selector = format!("{}={}", labels::APP_KEY, labels::APP_VALUE);
    let list = deployments
        .list(&ListParams::default().labels(&selector))
        .await?;

    let mut statuses: Vec<TrackStatus> = list.items.iter().filter_map(track_status).collect();
    statuses.sort_by_key(|s| s.release);

    debug!("Found {} tracked deployments", statuses.len());
    Ok(statuses)
}

fn track_status(deployment: &Deployment) -> Option<TrackStatus> {
    let name = deployment.name_any();
    let release = deployment
        .labels()
        .get(labels::TRACK_KEY)
        .and_then(|t| t.parse().ok())
        .or_else(|| {
            Release::ALL
                .into_iter()
                .find(|r| r.deployment_name() == name)
        })?;

    Some(TrackStatus {
        release,
        desired: deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1),
        ready: deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
        image: container_image(deployment),
        name,
    })
}

fn container_image(deployment: &Deployment) -> Option<String> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.containers.first())
        .and_then(|c| c.image.clone())
}

/// Poll until every tracked Deployment has all its replicas ready, giving up after `limit`.
#[instrument(skip(client))]
pub async fn wait_for_ready(
    client: &Client,
    namespace: &str,
    limit: Duration,
) -> Result<Vec<TrackStatus>> {
    timeout(limit, poll_until_ready(client, namespace))
        .await
        .map_err(|_| CanaryError::RolloutTimeout(format!("deployments in {}", namespace)))?
}

/// Backs off exponentially from POLL_INTERVAL_SECS up to POLL_MAX_INTERVAL_SECS.
async fn poll_until_ready(client: &Client, namespace: &str) -> Result<Vec<TrackStatus>> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        let statuses = observed_split(client, namespace).await?;
        if !statuses.is_empty() && statuses.iter().all(TrackStatus::is_ready) {
            info!("All {} deployments are ready", statuses.len());
            return Ok(statuses);
        }

        for status in statuses.iter().filter(|s| !s.is_ready()) {
            info!(
                "{} has {}/{} ready replicas, waiting {} seconds...",
                status.name, status.ready, status.desired, interval
            );
        }

        sleep(Duration::from_secs(interval)).await;
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Set the desired replica count of one release
#[instrument(skip(client))]
pub async fn scale(client: &Client, namespace: &str, release: Release, replicas: i32) -> Result<()> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let patch = json!({ "spec": { "replicas": replicas } });

    deployments
        .patch(release.deployment_name(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    info!("Scaled {} to {} replicas", release.deployment_name(), replicas);
    Ok(())
}

/// Roll the canary image into the stable Deployment, then remove the canary Deployment.
/// Returns the promoted image.
#[instrument(skip(client))]
pub async fn promote(client: &Client, namespace: &str) -> Result<String> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);

    let canary_name = Release::Canary.deployment_name();
    let canary = deployments
        .get_opt(canary_name)
        .await?
        .ok_or_else(|| CanaryError::MissingDeployment(canary_name.to_string()))?;
    let image =
        container_image(&canary).ok_or_else(|| CanaryError::MissingImage(canary_name.to_string()))?;

    let stable_name = Release::Stable.deployment_name();
    let stable = deployments
        .get_opt(stable_name)
        .await?
        .ok_or_else(|| CanaryError::MissingDeployment(stable_name.to_string()))?;
    let container = stable
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.containers.first())
        .map(|c| c.name.clone())
        .ok_or_else(|| CanaryError::MissingImage(stable_name.to_string()))?;

    // Strategic merge keys containers by name, so only the image changes
    let patch = json!({
        "spec": { "template": { "spec": { "containers": [
            { "name": container, "image": image }
        ] } } }
    });
    deployments
        .patch(stable_name, &PatchParams::default(), &Patch::Strategic(&patch))
        .await?;
    info!("Updated {} to image {}", stable_name, image);

    rollback(client, namespace).await?;

    Ok(image)
}

/// Delete the canary Deployment; all traffic returns to the stable pods.
/// Returns false when there was no canary to delete.
#[instrument(skip(client))]
pub async fn rollback(client: &Client, namespace: &str) -> Result<bool> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let name = Release::Canary.deployment_name();

    match deployments.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Deleted deployment {}/{}", namespace, name);
            Ok(true)
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!("Deployment {}/{} does not exist, nothing to roll back", namespace, name);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        deployment_list_json, deployment_path, deployment_with_status, namespace_json,
        MockService,
    };

    const DEPLOYMENTS: &str = "/apis/apps/v1/namespaces/default/deployments";

    fn json_of(deployment: &Deployment) -> String {
        serde_json::to_string(deployment).unwrap()
    }

    #[tokio::test]
    async fn test_observed_split_reports_ready_replicas() {
        let stable = deployment_with_status(Release::Stable, 3, 3);
        let canary = deployment_with_status(Release::Canary, 1, 0);
        let mock = MockService::new().on_get(
            DEPLOYMENTS,
            200,
            &deployment_list_json(&[canary, stable]),
        );

        let statuses = observed_split(&mock.client(), "default").await.unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].release, Release::Stable);
        assert_eq!(statuses[0].ready, 3);
        assert_eq!(statuses[1].release, Release::Canary);
        assert_eq!(statuses[1].desired, 1);
        assert!(!statuses[1].is_ready());
        assert_eq!(statuses[1].image.as_deref(), Some("myapp:v2"));

        let pool = ready_pool(&statuses);
        assert_eq!(pool.expected_share(Release::Canary), 0.0);
    }

    #[tokio::test]
    async fn test_observed_split_uses_label_selector() {
        let mock = MockService::new().on_get(DEPLOYMENTS, 200, &deployment_list_json(&[]));

        observed_split(&mock.client(), "default").await.unwrap();

        let requests = mock.requests_with("GET");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, DEPLOYMENTS);
    }

    #[test]
    fn test_track_status_falls_back_to_name() {
        let mut deployment = deployment_with_status(Release::Canary, 1, 1);
        deployment.metadata.labels = None;

        let status = track_status(&deployment).unwrap();
        assert_eq!(status.release, Release::Canary);
    }

    #[test]
    fn test_track_status_ignores_unrelated() {
        let mut deployment = deployment_with_status(Release::Canary, 1, 1);
        deployment.metadata.labels = None;
        deployment.metadata.name = Some("other".to_string());

        assert!(track_status(&deployment).is_none());
    }

    #[tokio::test]
    async fn test_wait_for_ready_returns_when_ready() {
        let mock = MockService::new().on_get(
            DEPLOYMENTS,
            200,
            &deployment_list_json(&[
                deployment_with_status(Release::Stable, 3, 3),
                deployment_with_status(Release::Canary, 1, 1),
            ]),
        );

        let statuses = wait_for_ready(&mock.client(), "default", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(ready_pool(&statuses).expected_share(Release::Stable), 0.75);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_ready_times_out() {
        let mock = MockService::new().on_get(
            DEPLOYMENTS,
            200,
            &deployment_list_json(&[deployment_with_status(Release::Canary, 1, 0)]),
        );

        let err = wait_for_ready(&mock.client(), "default", Duration::from_secs(30))
            .await
            .unwrap_err();

        assert!(matches!(err, CanaryError::RolloutTimeout(_)));
    }

    #[tokio::test]
    async fn test_apply_bundle_patches_every_object() {
        let bundle = Bundle::new("myapp", 3, 1);
        let mock = MockService::new()
            .on_patch("/api/v1/namespaces/demo", 200, &namespace_json("demo"))
            .on_patch(
                "/apis/apps/v1/namespaces/demo/deployments/myapp-stable",
                200,
                &json_of(&bundle.stable),
            )
            .on_patch(
                "/apis/apps/v1/namespaces/demo/deployments/myapp-canary",
                200,
                &json_of(&bundle.canary),
            )
            .on_patch(
                "/api/v1/namespaces/demo/services/myapp-service",
                200,
                &serde_json::to_string(&bundle.service).unwrap(),
            );

        apply_bundle(&mock.client(), "demo", &bundle).await.unwrap();

        let paths: Vec<String> = mock
            .requests_with("PATCH")
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(
            paths,
            vec![
                "/api/v1/namespaces/demo",
                "/apis/apps/v1/namespaces/demo/deployments/myapp-stable",
                "/apis/apps/v1/namespaces/demo/deployments/myapp-canary",
                "/api/v1/namespaces/demo/services/myapp-service",
            ]
        );
    }

    #[tokio::test]
    async fn test_scale_sends_replicas() {
        let path = deployment_path("default", "myapp-canary");
        let mock = MockService::new().on_patch(
            &path,
            200,
            &json_of(&deployment_with_status(Release::Canary, 2, 1)),
        );

        scale(&mock.client(), "default", Release::Canary, 2)
            .await
            .unwrap();

        let requests = mock.requests_with("PATCH");
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["spec"]["replicas"], 2);
    }

    #[tokio::test]
    async fn test_promote_moves_canary_image_to_stable() {
        let stable = deployment_with_status(Release::Stable, 3, 3);
        let canary = deployment_with_status(Release::Canary, 1, 1);
        let stable_path = deployment_path("default", "myapp-stable");
        let canary_path = deployment_path("default", "myapp-canary");
        let mock = MockService::new()
            .on_get(&stable_path, 200, &json_of(&stable))
            .on_get(&canary_path, 200, &json_of(&canary))
            .on_patch(&stable_path, 200, &json_of(&stable))
            .on_delete(&canary_path, 200, &json_of(&canary));

        let image = promote(&mock.client(), "default").await.unwrap();

        assert_eq!(image, "myapp:v2");
        let patches = mock.requests_with("PATCH");
        assert_eq!(patches.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&patches[0].body).unwrap();
        let container = &body["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["name"], "myapp");
        assert_eq!(container["image"], "myapp:v2");
        assert_eq!(mock.requests_with("DELETE")[0].path, canary_path);
    }

    #[tokio::test]
    async fn test_promote_without_canary_fails() {
        let mock = MockService::new();

        let err = promote(&mock.client(), "default").await.unwrap_err();

        assert!(matches!(err, CanaryError::MissingDeployment(ref name) if name == "myapp-canary"));
        assert!(mock.requests_with("PATCH").is_empty());
    }

    #[tokio::test]
    async fn test_rollback_deletes_canary() {
        let canary_path = deployment_path("default", "myapp-canary");
        let mock = MockService::new().on_delete(
            &canary_path,
            200,
            &json_of(&deployment_with_status(Release::Canary, 1, 1)),
        );

        assert!(rollback(&mock.client(), "default").await.unwrap());
        assert_eq!(mock.requests_with("DELETE").len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_without_canary_is_noop() {
        let mock = MockService::new();
        assert!(!rollback(&mock.client(), "default").await.unwrap());
    }
}
