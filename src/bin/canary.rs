// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;

use canary_kit::config::Config;
use canary_kit::responder;
use canary_kit::types::Release;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    canary_kit::init_tracing();

    let config = Config::from_env()?;
    responder::run(Release::Canary, &config).await?;

    Ok(())
}
