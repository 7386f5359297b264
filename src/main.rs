use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use shadow_auth::HttpTokenExchangeClient;
use shadow_auth::IdentityCache;
use shadow_auth::JsonFileIdentityStore;
use shadow_auth::JwtClaimsExtractor;
use shadow_auth::OAuthClientConfig;
use shadow_auth::TokenLifecycleCoordinator;
use shadow_auth::VerifierConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "shadow-auth", version, about = "Maintenance commands for shadowed identities")]
struct Cli {
    /// Expected `iss` of access tokens
    #[arg(long, env = "SHADOW_AUTH_ISSUER", global = true)]
    issuer: Option<String>,

    /// Expected `aud` of access tokens (defaults to the client id)
    #[arg(long, env = "SHADOW_AUTH_AUDIENCE", global = true)]
    audience: Option<String>,

    /// JWKS location, discovered from the issuer when unset
    #[arg(long, env = "SHADOW_AUTH_JWKS_URI", global = true)]
    jwks_uri: Option<String>,

    #[arg(long, env = "SHADOW_AUTH_CLIENT_ID", global = true)]
    client_id: Option<String>,

    #[arg(long, env = "SHADOW_AUTH_CLIENT_SECRET", global = true, hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = "SHADOW_AUTH_TOKEN_ENDPOINT", global = true)]
    token_endpoint: Option<String>,

    #[arg(long, env = "SHADOW_AUTH_REDIRECT_URI", global = true)]
    redirect_uri: Option<String>,

    /// JSON document holding the identities
    #[arg(long, env = "SHADOW_AUTH_STORE", global = true, default_value = "identities.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Renew existing access tokens using refresh tokens
    #[command(name = "token:renew")]
    TokenRenew,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::TokenRenew => renew_tokens(&cli).await,
    }
}

async fn renew_tokens(cli: &Cli) -> anyhow::Result<()> {
    let coordinator = build_coordinator(cli).await?;

    let report = coordinator.renew_expiring().await?;
    println!("Success renews {}", report.renewed);

    Ok(())
}

async fn build_coordinator(cli: &Cli) -> anyhow::Result<TokenLifecycleCoordinator> {
    let issuer = required(&cli.issuer, "SHADOW_AUTH_ISSUER")?;
    let client_id = required(&cli.client_id, "SHADOW_AUTH_CLIENT_ID")?;
    let client_secret = required(&cli.client_secret, "SHADOW_AUTH_CLIENT_SECRET")?;
    let token_endpoint = required(&cli.token_endpoint, "SHADOW_AUTH_TOKEN_ENDPOINT")?;
    // refresh grants never send it, but the client config wants one
    let redirect_uri = cli.redirect_uri.clone().unwrap_or_default();
    let audience = cli.audience.clone().unwrap_or_else(|| client_id.clone());

    let mut verifier_config = VerifierConfig::new(issuer, audience);
    if let Some(jwks_uri) = &cli.jwks_uri {
        verifier_config = verifier_config.with_jwks_uri(jwks_uri);
    }
    let extractor: JwtClaimsExtractor = JwtClaimsExtractor::new(verifier_config)?;

    let exchange = HttpTokenExchangeClient::new(OAuthClientConfig::new(
        client_id,
        client_secret,
        token_endpoint,
        redirect_uri,
    ))?;

    let store = JsonFileIdentityStore::open(&cli.store)
        .await
        .with_context(|| format!("opening identity store {}", cli.store.display()))?;

    Ok(TokenLifecycleCoordinator::new(
        Arc::new(extractor),
        Arc::new(exchange),
        IdentityCache::new(Arc::new(store)),
    ))
}

fn required(value: &Option<String>, env: &str) -> anyhow::Result<String> {
    value
        .clone()
        .with_context(|| format!("{env} is not set"))
}
