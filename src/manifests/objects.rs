// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed construction of the Deployment and Service objects

use crate::constants::{labels, names, ports};
use crate::types::Release;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Labels the Service selects on. Both workloads must carry all of them.
pub fn service_selector() -> BTreeMap<String, String> {
    BTreeMap::from([(labels::APP_KEY.to_string(), labels::APP_VALUE.to_string())])
}

/// Labels on the pods of one release: the shared app label plus its track
pub fn pod_labels(release: Release) -> BTreeMap<String, String> {
    let mut pod = service_selector();
    pod.insert(labels::TRACK_KEY.to_string(), release.to_string());
    pod
}

/// Build the Deployment for a release
pub fn deployment(release: Release, image_repository: &str, replicas: i32) -> Deployment {
    let pod = pod_labels(release);

    Deployment {
        metadata: ObjectMeta {
            name: Some(release.deployment_name().to_string()),
            labels: Some(pod.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(pod.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: names::CONTAINER.to_string(),
                        image: Some(release.image(image_repository)),
                        ports: Some(vec![ContainerPort {
                            container_port: i32::from(ports::CONTAINER),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the NodePort Service fronting both releases
pub fn service() -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(names::SERVICE.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            selector: Some(service_selector()),
            ports: Some(vec![ServicePort {
                port: i32::from(ports::SERVICE),
                target_port: Some(IntOrString::Int(i32::from(ports::CONTAINER))),
                node_port: Some(i32::from(ports::NODE)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
