// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Model of the Service's load balancing across the shared backend pool.
//!
//! The Service does not know about releases. Every ready pod matching its
//! selector is one equally likely backend, so the canary share is
//! `canary replicas / total replicas` and moves in steps of `1 / total`.
//! Stickiness and header based routing cannot be expressed this way.

use crate::manifests::{routes_to, Bundle};
use crate::types::Release;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

/// One pod behind the Service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backend {
    pub release: Release,
    pub pod: String,
}

/// Replica counts per release. Backends are numbered stable first, so a pick
/// is an index into `0..len` mapped back to its release by cumulative count.
#[derive(Clone, Debug, Default)]
pub struct BackendPool {
    replicas: BTreeMap<Release, u64>,
}

impl BackendPool {
    pub fn from_replicas(replicas: &[(Release, u32)]) -> Self {
        let mut counts = BTreeMap::new();
        for &(release, count) in replicas {
            *counts.entry(release).or_insert(0) += u64::from(count);
        }

        BackendPool { replicas: counts }
    }

    /// Pool as the Service sees it: workloads its selector misses contribute nothing
    pub fn from_bundle(bundle: &Bundle) -> Self {
        let replicas: Vec<(Release, u32)> = Release::ALL
            .iter()
            .map(|&release| {
                let deployment = bundle.deployment(release);
                let count = if routes_to(&bundle.service, deployment) {
                    // replicas defaults to 1 when omitted
                    let desired = deployment
                        .spec
                        .as_ref()
                        .and_then(|s| s.replicas)
                        .unwrap_or(1);
                    u32::try_from(desired).unwrap_or(0)
                } else {
                    0
                };
                (release, count)
            })
            .collect();

        Self::from_replicas(&replicas)
    }

    /// Number of backends
    pub fn len(&self) -> u64 {
        self.replicas.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn replicas(&self, release: Release) -> u64 {
        self.replicas.get(&release).copied().unwrap_or(0)
    }

    /// Fraction of backends running `release`; 0.0 for an empty pool
    pub fn expected_share(&self, release: Release) -> f64 {
        match self.len() {
            0 => 0.0,
            total => self.replicas(release) as f64 / total as f64,
        }
    }

    /// Uniform random backend selection
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Backend> {
        let (release, ordinal) = self.pick_ordinal(rng)?;
        Some(Backend {
            release,
            pod: format!("{}-{}", release.deployment_name(), ordinal),
        })
    }

    /// Release of a uniformly chosen backend, without naming the pod
    pub fn pick_release<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Release> {
        self.pick_ordinal(rng).map(|(release, _)| release)
    }

    fn pick_ordinal<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(Release, u64)> {
        let total = self.len();
        if total == 0 {
            return None;
        }
        self.locate(rng.random_range(0..total))
    }

    /// Release and per-release ordinal of the backend at `index`
    fn locate(&self, mut index: u64) -> Option<(Release, u64)> {
        for (&release, &count) in &self.replicas {
            if index < count {
                return Some((release, index));
            }
            index -= count;
        }
        None
    }
}

/// Responses observed per release over a simulated run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SplitReport {
    pub counts: BTreeMap<Release, u64>,
    pub total: u64,
}

impl SplitReport {
    pub fn count(&self, release: Release) -> u64 {
        self.counts.get(&release).copied().unwrap_or(0)
    }

    pub fn share(&self, release: Release) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(release) as f64 / self.total as f64
    }

    /// Stable responses per canary response; None when no canary answered
    pub fn ratio(&self) -> Option<f64> {
        match self.count(Release::Canary) {
            0 => None,
            canary => Some(self.count(Release::Stable) as f64 / canary as f64),
        }
    }
}

impl fmt::Display for SplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for release in Release::ALL {
            writeln!(
                f,
                "{:<7} {:>8} responses ({:>5.1}%)",
                release.to_string(),
                self.count(release),
                self.share(release) * 100.0
            )?;
        }
        Ok(())
    }
}

/// Send `requests` requests through the pool and tally who answered
pub fn simulate<R: Rng + ?Sized>(pool: &BackendPool, requests: u64, rng: &mut R) -> SplitReport {
    let mut report = SplitReport::default();

    for _ in 0..requests {
        let Some(release) = pool.pick_release(rng) else {
            break;
        };
        *report.counts.entry(release).or_insert(0) += 1;
        report.total += 1;
    }

    report
}
