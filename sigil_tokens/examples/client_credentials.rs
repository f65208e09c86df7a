//! Requests a client credentials token twice, showing the second request
//! being answered from the cache.
//!
//! Run with `cargo run --example client_credentials --features rustls-tls`,
//! passing options on the command line or through the environment (a `.env`
//! file is honored).

use std::{sync::Arc, time::Duration};

use clap::Parser;
use sigil_http::{HttpRequestPipeline, ReqwestTransport, RetryPolicy, Url};
use sigil_tokens::{
    ClientId, ClientSecret, ScopeSet, TokenAcquisitionFlow, TokenCaches, TokenRequest,
};

#[derive(Debug, Parser)]
struct Opts {
    /// The issuing authority, such as `https://login.example.com/<tenant>`
    #[arg(short, long, env)]
    authority: Url,

    /// The client ID of the client
    #[arg(short, long, env)]
    client_id: ClientId,

    /// The client secret used to identify the client to the issuing authority
    #[arg(short = 's', long, env, hide_env_values = true)]
    client_secret: ClientSecret,

    /// The scopes to request, separated by spaces
    #[arg(long, env, value_delimiter = ' ', required = true)]
    scopes: Vec<String>,

    /// Per-attempt timeout, in seconds
    #[arg(long, env, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let transport = ReqwestTransport::builder()
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()?;
    let pipeline = HttpRequestPipeline::new(transport).with_retry_policy(RetryPolicy::default());

    let caches = TokenCaches::process_default();
    let flow = TokenAcquisitionFlow::new(opts.client_id, pipeline, Arc::clone(caches.app()));

    let request = TokenRequest::client_credentials(
        opts.authority,
        opts.scopes.into_iter().collect::<ScopeSet>(),
        &opts.client_secret,
    );

    let first = flow.acquire_token(&request).await?;
    tracing::info!(
        token = format_args!("{:#?}", first.access_token()),
        expires_on = %first.expires_on(),
        "first access token"
    );

    let second = flow.acquire_token(&request).await?;
    tracing::info!(
        cache_hit = (first == second),
        cached = flow.cache().len(),
        "second access token"
    );

    Ok(())
}
