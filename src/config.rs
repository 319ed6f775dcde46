// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{names, ports};
use anyhow::{Context, Result};
use std::env;
use std::net::{Ipv4Addr, SocketAddr};

/// Responder configuration loaded from environment variables.
/// Every variable is optional; the defaults match the container image.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the responder binds to
    pub listen_addr: SocketAddr,
    /// Image repository used when rendering manifests
    pub image_repository: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, ports::CONTAINER)),
            image_repository: names::DEFAULT_IMAGE_REPOSITORY.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr
                .parse()
                .with_context(|| format!("LISTEN_ADDR is not a socket address: {}", addr))?;
        }
        if let Some(repository) = lookup("IMAGE_REPOSITORY").filter(|r| !r.is_empty()) {
            config.image_repository = repository;
        }

        Ok(config)
    }
}
