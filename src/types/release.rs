// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::CanaryError;
use std::fmt;
use std::str::FromStr;

/// The two versions running side by side behind the Service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Release {
    Stable,
    Canary,
}

impl Release {
    pub const ALL: [Release; 2] = [Release::Stable, Release::Canary];

    /// Fixed response body served on `GET /`
    pub fn body(self) -> &'static str {
        match self {
            Release::Stable => "Hello from the stable version (v1)",
            Release::Canary => "Hello from the canary version (v2)",
        }
    }

    /// Image tag the packaging step produces for this release
    pub fn tag(self) -> &'static str {
        match self {
            Release::Stable => "v1",
            Release::Canary => "v2",
        }
    }

    pub fn deployment_name(self) -> &'static str {
        match self {
            Release::Stable => "myapp-stable",
            Release::Canary => "myapp-canary",
        }
    }

    /// Replica count of the walkthrough; 3:1 gives the 75/25 split
    pub fn default_replicas(self) -> i32 {
        match self {
            Release::Stable => 3,
            Release::Canary => 1,
        }
    }

    /// Full image reference for the given repository
    pub fn image(self, repository: &str) -> String {
        format!("{}:{}", repository, self.tag())
    }

    /// Value of the `track` label
    pub fn as_str(self) -> &'static str {
        match self {
            Release::Stable => "stable",
            Release::Canary => "canary",
        }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Release {
    type Err = CanaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" | "v1" => Ok(Release::Stable),
            "canary" | "v2" => Ok(Release::Canary),
            _ => Err(CanaryError::UnknownRelease(s.to_string())),
        }
    }
}
