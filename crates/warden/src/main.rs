use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use warden::http::{build_router, AppState};
use warden::{initialize_root, RootConfig, RootError, RootResult};
use warden_policy::{ObjectRef, RelationName, RelationshipTuple, UserRef};

/// Warden: authorization-gated capability invocation gateway.
///
/// Authenticates callers, authorizes each action against a relationship
/// policy model, and routes generation across providers with fallback.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway HTTP server
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Evaluate one authorization check and print the decision
    Check {
        user: String,
        relation: String,
        object: String,
    },

    /// Write one relationship tuple
    WriteTuple {
        user: String,
        relation: String,
        object: String,
    },

    /// Mint a dev-issuer credential (requires auth.dev_issuer = true)
    IssueDevToken {
        subject: String,

        /// Lifetime in seconds
        #[arg(long, default_value = "3600")]
        ttl: u64,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("warden=debug,warden_policy=debug,warden_router=debug,warden_agent=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warden=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> RootResult<RootConfig> {
    match path {
        Some(path) => RootConfig::load(path),
        None => RootConfig::load(&RootConfig::default_config_path()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> RootResult<()> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { bind, port } => cmd_serve(config, bind, port).await,
        Commands::Check {
            user,
            relation,
            object,
        } => cmd_check(config, &user, &relation, &object).await,
        Commands::WriteTuple {
            user,
            relation,
            object,
        } => cmd_write_tuple(config, &user, &relation, &object).await,
        Commands::IssueDevToken { subject, ttl } => cmd_issue_dev_token(config, &subject, ttl),
    }
}

async fn cmd_serve(mut config: RootConfig, bind: Option<String>, port: Option<u16>) -> RootResult<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let address = format!("{}:{}", config.server.bind, config.server.port);
    let state = initialize_root(config)?;
    let router = build_router(Arc::new(AppState { root: state }));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(RootError::Io)?;
    info!(address = %address, "warden gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .map_err(RootError::Io)?;

    Ok(())
}

async fn cmd_check(config: RootConfig, user: &str, relation: &str, object: &str) -> RootResult<()> {
    let state = initialize_root(config)?;
    let decision = state
        .engine()
        .check(
            &UserRef::parse(user)?,
            &RelationName::new(relation)?,
            &ObjectRef::parse(object)?,
        )
        .await?;
    println!("{}", if decision { "allow" } else { "deny" });
    Ok(())
}

async fn cmd_write_tuple(
    config: RootConfig,
    user: &str,
    relation: &str,
    object: &str,
) -> RootResult<()> {
    let state = initialize_root(config)?;
    let tuple = RelationshipTuple::parse(user, relation, object)?;
    state.engine().write(std::slice::from_ref(&tuple)).await?;
    println!("wrote {tuple}");
    Ok(())
}

fn cmd_issue_dev_token(config: RootConfig, subject: &str, ttl: u64) -> RootResult<()> {
    let state = initialize_root(config)?;
    let issuer = state
        .dev_issuer
        .as_ref()
        .ok_or_else(|| RootError::Config("dev issuer not enabled (set auth.dev_issuer)".into()))?;
    println!("{}", issuer.issue(subject, &[], ttl));
    Ok(())
}
