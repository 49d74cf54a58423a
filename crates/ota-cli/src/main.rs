use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(
    name = "ota",
    about = "OTA release backend — bundle hashing and deployment management",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "ota.toml")]
    config: PathBuf,
    /// Override [storage].path from the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the manifest, package hash and platform of a bundle directory
    Hash {
        /// Bundle directory
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage deployments of an application
    Deployment {
        #[command(subcommand)]
        action: DeploymentAction,
    },
    /// Hash a bundle and publish it to a deployment
    Release(commands::release::ReleaseArgs),
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a user
    Add {
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum DeploymentAction {
    /// Create a deployment
    Add {
        #[arg(long)]
        app: u64,
        #[arg(long)]
        name: String,
        /// Creating user id
        #[arg(long)]
        user: u64,
    },
    /// Rename a deployment
    Rename {
        #[arg(long)]
        app: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        new_name: String,
    },
    /// Delete a deployment and its release history
    Rm {
        #[arg(long)]
        app: u64,
        #[arg(long)]
        name: String,
    },
    /// List deployments with the release each serves
    Ls {
        #[arg(long)]
        app: u64,
    },
    /// Show recent releases of a deployment
    History {
        #[arg(long)]
        app: u64,
        #[arg(long)]
        name: String,
        /// Entries to show (default: [history].limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Purge the release history of a deployment
    Clear {
        #[arg(long)]
        app: u64,
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,ota=debug"))?,
        )
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(&cli.config, cli.db)?;

    match cli.command {
        Commands::Hash { path, format } => commands::hash::hash(&ctx, &path, &format).await,
        Commands::User { action } => match action {
            UserAction::Add { email } => commands::user::add(&ctx, &email),
        },
        Commands::Deployment { action } => match action {
            DeploymentAction::Add { app, name, user } => {
                commands::deployment::add(&ctx, app, &name, user)
            }
            DeploymentAction::Rename { app, name, new_name } => {
                commands::deployment::rename(&ctx, app, &name, &new_name)
            }
            DeploymentAction::Rm { app, name } => commands::deployment::remove(&ctx, app, &name),
            DeploymentAction::Ls { app } => commands::deployment::list(&ctx, app).await,
            DeploymentAction::History { app, name, limit } => {
                commands::deployment::history(&ctx, app, &name, limit).await
            }
            DeploymentAction::Clear { app, name } => {
                commands::deployment::clear(&ctx, app, &name)
            }
        },
        Commands::Release(args) => commands::release::release(&ctx, args).await,
    }
}
