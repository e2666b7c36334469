use std::net::SocketAddr;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use zoneflow::{
    emulator::{ClientCredentials, EmulatorConfig, EmulatorState, create_router},
    store::StoreOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    /// Listen address for the HTTP server
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8780")]
    listen: SocketAddr,
    /// Tenant accepted by the token endpoint
    #[arg(long, value_name = "ID", requires_all = ["client_id", "client_secret"])]
    tenant_id: Option<String>,
    /// Client id accepted by the token endpoint
    #[arg(long, value_name = "ID", requires = "tenant_id")]
    client_id: Option<String>,
    /// Client secret accepted by the token endpoint
    #[arg(long, value_name = "SECRET", requires = "tenant_id")]
    client_secret: Option<String>,
    /// Bearer token accepted without a token exchange (repeat for multiple values)
    #[arg(long = "access-token", value_name = "TOKEN")]
    access_tokens: Vec<String>,
    /// Name server placed in the apex NS record set of new zones (repeat for multiple values)
    #[arg(long = "name-server", value_name = "FQDN")]
    name_servers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = build_emulator_config(&cli)?;
    let app = create_router(EmulatorState::new(config));

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind to {}", cli.listen))?;

    info!("emulator listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    Ok(())
}

fn build_emulator_config(cli: &Cli) -> Result<EmulatorConfig> {
    let credentials = match (&cli.tenant_id, &cli.client_id, &cli.client_secret) {
        (Some(tenant_id), Some(client_id), Some(client_secret)) => vec![ClientCredentials {
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        }],
        _ => Vec::new(),
    };

    let static_tokens: Vec<String> = cli
        .access_tokens
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if credentials.is_empty() && static_tokens.is_empty() {
        bail!("configure --tenant-id/--client-id/--client-secret or at least one --access-token");
    }

    let apex_name_servers = cli
        .name_servers
        .iter()
        .map(|ns| normalize_fqdn(ns).with_context(|| format!("invalid name-server value '{ns}'")))
        .collect::<Result<Vec<_>>>()?;

    Ok(EmulatorConfig {
        credentials,
        static_tokens,
        store: StoreOptions {
            apex_name_servers,
            ..StoreOptions::default()
        },
    })
}

fn normalize_fqdn(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        bail!("FQDN cannot be empty");
    }
    Ok(format!("{}.", trimmed))
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install CTRL+C handler: {err}");
    }
    info!("shutdown signal received");
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
