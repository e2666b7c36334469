use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use zoneflow::{
    DnsManagementClient, Workflow,
    auth::{ClientSecretCredential, DEFAULT_AUTHORITY, StaticTokenCredential, TokenCredential},
    config::{ClientConfig, DEFAULT_MANAGEMENT_ENDPOINT, WorkflowConfig},
    validation::validate_zone_name,
};

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    /// Directory (tenant) id of the service principal
    #[arg(long, value_name = "ID")]
    tenant_id: Option<String>,
    /// Application (client) id of the service principal
    #[arg(long, value_name = "ID")]
    client_id: Option<String>,
    /// Client secret of the service principal
    #[arg(long, value_name = "SECRET")]
    client_secret: Option<String>,
    /// Bearer token to use instead of the client-secret exchange
    #[arg(long, value_name = "TOKEN")]
    access_token: Option<String>,
    /// Subscription that owns the resource group
    #[arg(long, value_name = "ID")]
    subscription_id: String,
    /// Resource group that holds the zone
    #[arg(long, value_name = "NAME")]
    resource_group: String,
    /// Zone to create, populate and delete (e.g. contoso.com)
    #[arg(long, value_name = "DOMAIN")]
    zone_name: String,
    /// Management API endpoint
    #[arg(long, value_name = "URL", default_value = DEFAULT_MANAGEMENT_ENDPOINT)]
    management_endpoint: String,
    /// Identity authority that issues tokens
    #[arg(long, value_name = "URL", default_value = DEFAULT_AUTHORITY)]
    authority: String,
    /// Timeout for each request and each workflow step
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    timeout_secs: u64,
    /// Page size hint for record set enumeration
    #[arg(long, value_name = "N", default_value_t = 2)]
    page_size: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let (client_config, workflow_config) = build_configs(&cli)?;
    let credential = build_credential(&cli, &client_config)?;
    let client = DnsManagementClient::new(client_config, credential)
        .context("failed to build HTTP client")?;
    client
        .authenticate()
        .await
        .context("failed to authenticate")?;

    info!(
        resource_group = %workflow_config.resource_group,
        zone = %workflow_config.zone_name,
        "starting zone workflow"
    );
    let reports = Workflow::standard(workflow_config)
        .run_with(&client, |report| println!("{report}"))
        .await;

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    info!(steps = reports.len(), failed, "zone workflow finished");
    Ok(())
}

fn build_configs(cli: &Cli) -> Result<(ClientConfig, WorkflowConfig)> {
    validate_zone_name(&cli.zone_name)
        .with_context(|| format!("invalid zone name '{}'", cli.zone_name))?;
    if cli.resource_group.trim().is_empty() {
        bail!("--resource-group cannot be empty");
    }
    if cli.page_size == 0 {
        bail!("--page-size must be at least 1");
    }
    if cli.timeout_secs == 0 {
        bail!("--timeout-secs must be at least 1");
    }

    let timeout = Duration::from_secs(cli.timeout_secs);
    let mut client_config = ClientConfig::new(&cli.management_endpoint, &cli.subscription_id);
    client_config.timeout = timeout;

    let mut workflow_config = WorkflowConfig::new(&cli.resource_group, &cli.zone_name);
    workflow_config.page_size = cli.page_size;
    workflow_config.step_timeout = timeout;

    Ok((client_config, workflow_config))
}

fn build_credential(cli: &Cli, config: &ClientConfig) -> Result<Arc<dyn TokenCredential>> {
    if let Some(token) = &cli.access_token {
        return Ok(Arc::new(StaticTokenCredential::new(token)));
    }

    let (Some(tenant_id), Some(client_id), Some(client_secret)) =
        (&cli.tenant_id, &cli.client_id, &cli.client_secret)
    else {
        bail!("either --access-token or all of --tenant-id, --client-id and --client-secret are required");
    };

    let http = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .context("failed to build identity HTTP client")?;
    Ok(Arc::new(ClientSecretCredential::new(
        http,
        &cli.authority,
        tenant_id,
        client_id,
        client_secret,
        config.token_scope(),
    )))
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
