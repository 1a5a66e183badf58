// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runtara Repository - Deployment Management CLI
//!
//! Deploys resource bundles, removes deployments with their derived state
//! and lists what is deployed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use runtara_repository::config::Config;
use runtara_repository::{
    BroadcastDispatcher, DeploymentBuilder, DeploymentQuery, Page, RepositoryService,
};

#[derive(Parser)]
#[command(name = "runtara-repository")]
#[command(about = "Manage runtara deployments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy files as a new deployment
    Deploy {
        /// Deployment name
        #[arg(short, long)]
        name: String,

        /// Owning tenant
        #[arg(short, long)]
        tenant: Option<String>,

        /// Deployment category
        #[arg(short, long)]
        category: Option<String>,

        /// Resource files; `*.process.json` files register process definitions
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Delete a deployment and everything derived from it
    Undeploy {
        /// Deployment id
        deployment_id: String,

        /// Also terminate running process instances
        #[arg(long)]
        cascade: bool,
    },

    /// List deployments
    List {
        /// Only deployments of this tenant
        #[arg(short, long)]
        tenant: Option<String>,

        /// SQL LIKE pattern on the deployment name
        #[arg(long)]
        name_like: Option<String>,

        /// Maximum number of deployments
        #[arg(long, default_value_t = 50)]
        limit: i64,

        /// Number of deployments to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// List the resources of a deployment
    Resources {
        /// Deployment id
        deployment_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runtara_repository=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let dispatcher = BroadcastDispatcher::new(config.event_channel_capacity)
        .enabled(config.event_dispatch_enabled);
    let mut events = dispatcher.subscribe();

    let service = RepositoryService::from_config(&config, Arc::new(dispatcher)).await?;
    info!("Connected to repository database");

    match cli.command {
        Commands::Deploy {
            name,
            tenant,
            category,
            files,
        } => {
            let mut builder = DeploymentBuilder::new(name);
            if let Some(tenant) = tenant {
                builder = builder.tenant_id(tenant);
            }
            if let Some(category) = category {
                builder = builder.category(category);
            }
            for path in &files {
                let resource_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .with_context(|| format!("{} is not a file", path.display()))?;
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                builder = builder.resource(resource_name, bytes);
            }

            let deployment = builder.build();
            let definitions = service.deploy(&deployment).await?;

            println!("{}", deployment.deployment.id);
            for definition in definitions {
                println!("  {} (version {})", definition.id, definition.version);
            }
        }
        Commands::Undeploy {
            deployment_id,
            cascade,
        } => {
            service.delete_deployment(&deployment_id, cascade).await?;
            println!("Deleted {}", deployment_id);
        }
        Commands::List {
            tenant,
            name_like,
            limit,
            offset,
        } => {
            let query = DeploymentQuery {
                tenant_id: tenant,
                name_like,
                ..Default::default()
            };
            let total = service.find_deployment_count_by_query_criteria(&query).await?;
            let deployments = service
                .find_deployments_by_query_criteria(&query, Some(Page::new(offset, limit)))
                .await?;

            for deployment in &deployments {
                println!(
                    "{}\t{}\t{}\t{}",
                    deployment.id,
                    deployment.name.as_deref().unwrap_or("-"),
                    if deployment.tenant_id.is_empty() {
                        "-"
                    } else {
                        deployment.tenant_id.as_str()
                    },
                    deployment.deploy_time.to_rfc3339()
                );
            }
            println!("{} of {} deployments", deployments.len(), total);
        }
        Commands::Resources { deployment_id } => {
            let deployment = service.get_deployment(&deployment_id).await?;
            for name in service.get_deployment_resource_names(&deployment.id).await? {
                println!("{}", name);
            }
        }
    }

    while let Ok(event) = events.try_recv() {
        info!(
            event_type = %event.event_type,
            entity_id = %event.entity_id,
            "Lifecycle event"
        );
    }

    Ok(())
}
