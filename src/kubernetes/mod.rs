// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client creation and the manual rollout steps of the walkthrough.

pub mod client;
pub mod rollout;

pub use client::create_client;
pub use rollout::{
    apply_bundle, observed_split, promote, rollback, scale, wait_for_ready, TrackStatus,
};
