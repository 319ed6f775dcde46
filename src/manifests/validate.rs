// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cross-checks between the two Deployments and the Service.
//!
//! The Service only reaches pods whose labels contain its whole selector, so a
//! typo in either template label silently drops that release from the pool.

use super::Bundle;
use crate::error::ManifestError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Check every invariant the traffic split depends on
pub fn validate(bundle: &Bundle) -> Result<(), ManifestError> {
    let selector = service_selector(&bundle.service)?;

    for deployment in [&bundle.stable, &bundle.canary] {
        check_replicas(deployment)?;
        check_own_selector(deployment)?;
        check_routed(&bundle.service, selector, deployment)?;
        check_ports(&bundle.service, deployment)?;
    }

    if bundle.stable.name_any() == bundle.canary.name_any() {
        return Err(ManifestError::DuplicateName {
            name: bundle.stable.name_any(),
        });
    }

    Ok(())
}

/// Whether the Service selector matches the Deployment's pods
pub fn routes_to(service: &Service, deployment: &Deployment) -> bool {
    match (service_selector(service), template_labels(deployment)) {
        (Ok(selector), Ok(labels)) => is_subset(selector, labels),
        _ => false,
    }
}

fn service_selector(service: &Service) -> Result<&BTreeMap<String, String>, ManifestError> {
    let selector = service
        .spec
        .as_ref()
        .and_then(|s| s.selector.as_ref())
        .ok_or_else(|| missing(&format!("service {}", service.name_any()), "spec.selector"))?;

    if selector.is_empty() {
        return Err(ManifestError::EmptySelector {
            service: service.name_any(),
        });
    }
    Ok(selector)
}

fn template_labels(deployment: &Deployment) -> Result<&BTreeMap<String, String>, ManifestError> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.labels.as_ref())
        .ok_or_else(|| {
            missing(
                &format!("deployment {}", deployment.name_any()),
                "spec.template.metadata.labels",
            )
        })
}

fn check_replicas(deployment: &Deployment) -> Result<(), ManifestError> {
    match deployment.spec.as_ref().and_then(|s| s.replicas) {
        Some(replicas) if replicas < 0 => Err(ManifestError::NegativeReplicas {
            deployment: deployment.name_any(),
            replicas,
        }),
        _ => Ok(()),
    }
}

fn check_own_selector(deployment: &Deployment) -> Result<(), ManifestError> {
    let labels = template_labels(deployment)?;
    let match_labels = deployment
        .spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.as_ref())
        .ok_or_else(|| {
            missing(
                &format!("deployment {}", deployment.name_any()),
                "spec.selector.matchLabels",
            )
        })?;

    if match_labels.is_empty() || !is_subset(match_labels, labels) {
        return Err(ManifestError::SelectorMismatch {
            deployment: deployment.name_any(),
        });
    }
    Ok(())
}

fn check_routed(
    service: &Service,
    selector: &BTreeMap<String, String>,
    deployment: &Deployment,
) -> Result<(), ManifestError> {
    let labels = template_labels(deployment)?;

    match selector.iter().find(|(k, v)| labels.get(*k) != Some(*v)) {
        Some((key, value)) => Err(ManifestError::Unrouted {
            service: service.name_any(),
            deployment: deployment.name_any(),
            label: format!("{}={}", key, value),
        }),
        None => Ok(()),
    }
}

fn check_ports(service: &Service, deployment: &Deployment) -> Result<(), ManifestError> {
    let ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .ok_or_else(|| missing(&format!("service {}", service.name_any()), "spec.ports"))?;

    let containers = deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| p.containers.as_slice())
        .unwrap_or_default();

    for port in ports {
        // targetPort defaults to port when omitted
        let target = port
            .target_port
            .clone()
            .unwrap_or(IntOrString::Int(port.port));

        let exposed = containers
            .iter()
            .flat_map(|c| c.ports.iter().flatten())
            .any(|p| match &target {
                IntOrString::Int(n) => p.container_port == *n,
                IntOrString::String(name) => p.name.as_deref() == Some(name.as_str()),
            });

        if !exposed {
            let port = match target {
                IntOrString::Int(n) => n.to_string(),
                IntOrString::String(name) => name,
            };
            return Err(ManifestError::PortMismatch {
                deployment: deployment.name_any(),
                port,
            });
        }
    }
    Ok(())
}

fn is_subset(needle: &BTreeMap<String, String>, haystack: &BTreeMap<String, String>) -> bool {
    needle.iter().all(|(k, v)| haystack.get(k) == Some(v))
}

fn missing(object: &str, field: &str) -> ManifestError {
    ManifestError::MissingField {
        object: object.to_string(),
        field: field.to_string(),
    }
}
