// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster client creation

use crate::error::{CanaryError, Result};
use kube::{config::KubeConfigOptions, Client, Config as KConfig};
use tracing::{debug, instrument};

/// Create a client for the current kubeconfig context, or for `context` when given.
/// Falls back to the in-cluster service account when no kubeconfig is present.
#[instrument]
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(context) => {
            debug!("Using kubeconfig context {}", context);
            let options = KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            };
            KConfig::from_kubeconfig(&options).await.map_err(|e| {
                CanaryError::KubeconfigError(format!("Failed to load context {}: {}", context, e))
            })?
        }
        None => KConfig::infer()
            .await
            .map_err(|e| CanaryError::KubeconfigError(format!("Failed to infer config: {}", e)))?,
    };

    debug!("Connecting to {}", config.cluster_url);

    Client::try_from(config)
        .map_err(|e| CanaryError::KubeconfigError(format!("Failed to create client: {}", e)))
}
