// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanaryError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to load kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Deployment {0} not found")]
    MissingDeployment(String),

    #[error("Deployment {0} has no container image")]
    MissingImage(String),

    #[error("Timed out waiting for {0} to become ready")]
    RolloutTimeout(String),

    #[error("Unknown release: {0} (expected stable, canary, v1 or v2)")]
    UnknownRelease(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems found while loading or cross-checking the manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{object} is missing {field}")]
    MissingField { object: String, field: String },

    #[error("Service {service} has an empty selector")]
    EmptySelector { service: String },

    #[error("Deployment {deployment} selector does not match its pod template labels")]
    SelectorMismatch { deployment: String },

    #[error("Service {service} does not route to deployment {deployment}: pod template lacks label {label}")]
    Unrouted {
        service: String,
        deployment: String,
        label: String,
    },

    #[error("Deployment {deployment} does not expose target port {port}")]
    PortMismatch { deployment: String, port: String },

    #[error("Deployment {deployment} asks for {replicas} replicas")]
    NegativeReplicas { deployment: String, replicas: i32 },

    #[error("Both deployments are named {name}")]
    DuplicateName { name: String },
}

pub type Result<T> = std::result::Result<T, CanaryError>;
