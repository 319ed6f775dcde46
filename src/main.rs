// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use canary_kit::config::Config;
use canary_kit::constants::files;
use canary_kit::kubernetes::{self, rollout::ready_pool};
use canary_kit::manifests::{self, Bundle};
use canary_kit::traffic::{simulate, BackendPool};
use canary_kit::types::Release;

/// Manual steps of a replica-ratio canary rollout.
#[derive(Debug, Parser)]
#[command(name = "canaryctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Namespace holding the deployments.
    #[arg(long, global = true, env = "NAMESPACE", default_value = "default")]
    namespace: String,

    /// Kubeconfig context; defaults to the current one.
    #[arg(long, global = true)]
    context: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the manifests for the given image repository and replica counts.
    Render {
        #[arg(long)]
        image: Option<String>,
        #[arg(long, default_value_t = Release::Stable.default_replicas())]
        stable_replicas: i32,
        #[arg(long, default_value_t = Release::Canary.default_replicas())]
        canary_replicas: i32,
    },
    /// Validate the manifest files and print the split they produce.
    Check {
        #[arg(long, default_value = files::DEFAULT_DIR)]
        dir: PathBuf,
    },
    /// Send simulated requests through the Service's backend pool.
    Simulate {
        #[arg(long, default_value = files::DEFAULT_DIR)]
        dir: PathBuf,
        #[arg(long, default_value_t = 10_000)]
        requests: u64,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Apply both deployments and the service.
    Apply {
        #[arg(long, default_value = files::DEFAULT_DIR)]
        dir: PathBuf,
    },
    /// Show ready replicas per release and the resulting traffic share.
    Split {
        /// Wait up to this many seconds for every replica to become ready.
        #[arg(long)]
        wait: Option<u64>,
    },
    /// Set the replica count of one release (stable, canary, v1 or v2).
    Scale { release: Release, replicas: i32 },
    /// Move the canary image into the stable deployment and delete the canary.
    Promote,
    /// Delete the canary deployment.
    Rollback,
}

#[tokio::main]
async fn main() -> Result<()> {
    canary_kit::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            image,
            stable_replicas,
            canary_replicas,
        } => {
            let repository = match image {
                Some(image) => image,
                None => Config::from_env()?.image_repository,
            };
            let bundle = Bundle::new(&repository, stable_replicas, canary_replicas);
            manifests::validate(&bundle)?;
            print!("{}", bundle.render()?);
        }
        Command::Check { dir } => {
            let bundle = load_valid_bundle(&dir)?;
            let pool = BackendPool::from_bundle(&bundle);
            println!("{} backends behind the service", pool.len());
            print_expected(&pool);
        }
        Command::Simulate {
            dir,
            requests,
            seed,
        } => {
            let bundle = load_valid_bundle(&dir)?;
            let pool = BackendPool::from_bundle(&bundle);
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            print_expected(&pool);
            print!("{}", simulate(&pool, requests, &mut rng));
        }
        Command::Apply { dir } => {
            let bundle = load_valid_bundle(&dir)?;
            let client = kubernetes::create_client(cli.context.as_deref()).await?;
            kubernetes::apply_bundle(&client, &cli.namespace, &bundle).await?;
        }
        Command::Split { wait } => {
            let client = kubernetes::create_client(cli.context.as_deref()).await?;
            let statuses = match wait {
                Some(secs) => {
                    kubernetes::wait_for_ready(&client, &cli.namespace, Duration::from_secs(secs))
                        .await?
                }
                None => kubernetes::observed_split(&client, &cli.namespace).await?,
            };

            if statuses.is_empty() {
                bail!("no deployments labelled app=myapp in {}", cli.namespace);
            }
            for status in &statuses {
                println!(
                    "{:<14} {:<7} {}/{} ready  {}",
                    status.name,
                    status.release.to_string(),
                    status.ready,
                    status.desired,
                    status.image.as_deref().unwrap_or("-")
                );
            }
            print_expected(&ready_pool(&statuses));
        }
        Command::Scale { release, replicas } => {
            if replicas < 0 {
                bail!("replicas must not be negative");
            }
            let client = kubernetes::create_client(cli.context.as_deref()).await?;
            kubernetes::scale(&client, &cli.namespace, release, replicas).await?;
        }
        Command::Promote => {
            let client = kubernetes::create_client(cli.context.as_deref()).await?;
            let image = kubernetes::promote(&client, &cli.namespace).await?;
            info!("Promotion complete, all traffic now served by {}", image);
        }
        Command::Rollback => {
            let client = kubernetes::create_client(cli.context.as_deref()).await?;
            if kubernetes::rollback(&client, &cli.namespace).await? {
                info!("Rollback complete, all traffic now served by the stable release");
            }
        }
    }

    Ok(())
}

fn load_valid_bundle(dir: &std::path::Path) -> Result<Bundle> {
    let bundle = Bundle::load(dir)
        .with_context(|| format!("Failed to load manifests from {}", dir.display()))?;
    manifests::validate(&bundle)?;
    Ok(bundle)
}

fn print_expected(pool: &BackendPool) {
    for release in Release::ALL {
        println!(
            "{:<7} expected share {:>5.1}%",
            release.to_string(),
            pool.expected_share(release) * 100.0
        );
    }
}
