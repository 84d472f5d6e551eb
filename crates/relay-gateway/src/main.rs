//! Gateway entry point: parse CLI flags, load the config file, compile
//! routing state, and serve the MCP + OAuth2 HTTP surfaces until killed.

mod combined;
mod config;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use relay_dispatcher::build_dispatcher;
use relay_egress_acl::EgressAllowList;
use relay_http_front::router::AppState;
use relay_oauth::InMemoryOAuthProvider;
use relay_protocol::Implementation;
use relay_session_store::{BoxedSessionStore, InMemoryStore};
use relay_state::{build_state_from_config, StateEngine};
use relay_tool_pipeline::ToolPipeline;
use tracing_subscriber::EnvFilter;

use crate::config::FileConfig;

#[derive(Parser)]
#[command(author, version, about = "Multi-tenant MCP gateway", long_about = None)]
struct Cli {
    /// Path to the gateway's YAML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Override the bind address from the config file.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut file_config = FileConfig::load(&cli.config)?;
    if let Some(bind) = cli.bind {
        file_config.bind_address = bind;
    }
    let bind_address = file_config
        .bind_address
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {e}", file_config.bind_address))?;

    let (state, background) = build_state_from_config(&file_config.gateway, None)?;
    for handle in background {
        tokio::spawn(async move {
            let _ = handle.await;
        });
    }
    let state = Arc::new(StateEngine::new(state));

    let allow_list = EgressAllowList::new(&file_config.egress_allow_list);
    let tool_pipeline = Arc::new(ToolPipeline::new(reqwest::Client::new(), allow_list));

    let dispatcher = build_dispatcher(
        state.clone(),
        tool_pipeline,
        Implementation::new("relay-gateway", env!("CARGO_PKG_VERSION")),
    );
    let sessions: Arc<BoxedSessionStore> = Arc::new(InMemoryStore::new());
    let app = Arc::new(AppState::new(state, dispatcher, sessions));

    let oauth = Arc::new(InMemoryOAuthProvider::new(
        file_config.oauth_issuer.clone(),
        std::env::var("RELAY_OAUTH_SIGNING_KEY")
            .unwrap_or_else(|_| "relay-gateway-dev-signing-key".to_string())
            .into_bytes(),
    ));

    server::serve(bind_address, app, oauth).await?;
    Ok(())
}
