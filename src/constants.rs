// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Pod labels shared by both workloads
pub mod labels {
    /// Key of the label the Service selects on
    pub const APP_KEY: &str = "app";
    /// Value carried by every pod, stable and canary alike
    pub const APP_VALUE: &str = "myapp";
    /// Key distinguishing the two workloads' own selectors
    pub const TRACK_KEY: &str = "track";
}

/// Object names as they appear in the cluster
pub mod names {
    pub const SERVICE: &str = "myapp-service";
    pub const CONTAINER: &str = "myapp";
    /// Image repository used when IMAGE_REPOSITORY is not set
    pub const DEFAULT_IMAGE_REPOSITORY: &str = "myapp";
}

/// Network ports
pub mod ports {
    /// Port the responders listen on inside the container
    pub const CONTAINER: u16 = 8080;
    /// Cluster-internal Service port
    pub const SERVICE: u16 = 80;
    /// Port exposed on every node
    pub const NODE: u16 = 30080;
}

/// Manifest file names under the manifest directory
pub mod files {
    pub const DEFAULT_DIR: &str = "k8s";
    pub const STABLE_DEPLOYMENT: &str = "deployment-stable.yaml";
    pub const CANARY_DEPLOYMENT: &str = "deployment-canary.yaml";
    pub const SERVICE: &str = "service.yaml";
}

/// The field manager name used for server-side apply
pub const FIELD_MANAGER: &str = "canaryctl";

/// Rollout polling configuration
pub mod rollout {
    /// Initial polling interval in seconds when waiting for ready replicas
    pub const POLL_INTERVAL_SECS: u64 = 2;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 16;
}
