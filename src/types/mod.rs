// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Domain types shared by the responders, the manifests and the rollout tooling.

pub mod release;

pub use release::Release;
