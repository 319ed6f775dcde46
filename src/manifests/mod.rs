// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The three Kubernetes objects making up the canary setup: one Deployment per
//! release and a NodePort Service selecting the label both share.

pub mod objects;
pub mod validate;

pub use objects::{deployment, pod_labels, service, service_selector};
pub use validate::{routes_to, validate};

use crate::constants::files;
use crate::error::ManifestError;
use crate::types::Release;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Both workloads plus the entry point in front of them
#[derive(Clone, Debug, PartialEq)]
pub struct Bundle {
    pub stable: Deployment,
    pub canary: Deployment,
    pub service: Service,
}

impl Bundle {
    /// Build the bundle from typed defaults
    pub fn new(image_repository: &str, stable_replicas: i32, canary_replicas: i32) -> Self {
        Bundle {
            stable: deployment(Release::Stable, image_repository, stable_replicas),
            canary: deployment(Release::Canary, image_repository, canary_replicas),
            service: service(),
        }
    }

    /// Load the three manifest files from `dir`
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        Ok(Bundle {
            stable: load_deployment(&dir.join(files::STABLE_DEPLOYMENT))?,
            canary: load_deployment(&dir.join(files::CANARY_DEPLOYMENT))?,
            service: load_service(&dir.join(files::SERVICE))?,
        })
    }

    pub fn deployment(&self, release: Release) -> &Deployment {
        match release {
            Release::Stable => &self.stable,
            Release::Canary => &self.canary,
        }
    }

    /// Render all objects as one multi-document YAML stream
    pub fn render(&self) -> Result<String, ManifestError> {
        let documents = [
            serde_yaml::to_string(&self.stable)?,
            serde_yaml::to_string(&self.canary)?,
            serde_yaml::to_string(&self.service)?,
        ];
        Ok(documents.join("---\n"))
    }
}

pub fn parse_deployment(yaml: &str) -> Result<Deployment, ManifestError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn parse_service(yaml: &str) -> Result<Service, ManifestError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn load_deployment(path: &Path) -> Result<Deployment, ManifestError> {
    load(path)
}

pub fn load_service(path: &Path) -> Result<Service, ManifestError> {
    load(path)
}

fn load<K: DeserializeOwned>(path: &Path) -> Result<K, ManifestError> {
    debug!("Loading manifest {}", path.display());

    let yaml = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_yaml::from_str(&yaml)?)
}
