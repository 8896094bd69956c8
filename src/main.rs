use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use futures::Stream;

use poe_bot_runtime::config::{resolve_access_key, verify_access_key, ClientConfig, ServerConfig};
use poe_bot_runtime::protocol::{
    PartialResponse, QueryRequest, ReportErrorRequest, ReportFeedbackRequest,
    ReportReactionRequest, SettingsResponse,
};
use poe_bot_runtime::server::{sync_settings, BotHost, PoeBot, RequestContext, ResponseElement};

/// Host a Poe bot over HTTP.
#[derive(Parser)]
#[command(name = "poe-bot-runtime")]
#[command(author, version, about = "Host a Poe bot over HTTP", long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Name this bot is registered under on the Poe platform.
    #[arg(long)]
    bot_name: Option<String>,

    /// Access key the platform must present. Falls back to POE_ACCESS_KEY,
    /// then the deprecated --api-key/POE_API_KEY.
    #[arg(long)]
    access_key: Option<String>,

    /// Deprecated alias for --access-key.
    #[arg(long)]
    api_key: Option<String>,

    /// Allow serving without an access key (local testing only).
    #[arg(long)]
    allow_without_key: bool,

    /// Skip pushing bot settings to the registry at boot.
    #[arg(long)]
    skip_settings_sync: bool,
}

/// A bot that echoes the latest user message back as its response. Serves
/// as a minimal, runnable `PoeBot` implementation.
struct EchoBot;

#[async_trait]
impl PoeBot for EchoBot {
    fn get_response(
        &self,
        request: QueryRequest,
        _ctx: RequestContext,
    ) -> Box<dyn Stream<Item = ResponseElement> + Send + Unpin> {
        let text = request
            .query
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        Box::new(futures::stream::iter(vec![ResponseElement::Partial(
            PartialResponse::text(text),
        )]))
    }

    async fn get_settings(&self) -> SettingsResponse {
        let mut settings = SettingsResponse::new();
        settings.introduction_message = Some("Hi! I'll echo back whatever you send me.".to_string());
        settings
    }

    async fn on_feedback(&self, _request: ReportFeedbackRequest) {}
    async fn on_reaction(&self, _request: ReportReactionRequest) {}
    async fn on_error(&self, request: ReportErrorRequest) {
        log::error!("platform reported an error: {}", request.message);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let access_key = resolve_access_key(cli.access_key.as_deref(), cli.api_key.as_deref());
    if let Err(err) = verify_access_key(access_key.as_deref(), cli.allow_without_key) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let mut server_config = ServerConfig::new().allow_without_key(cli.allow_without_key);
    if let Some(bot_name) = &cli.bot_name {
        server_config = server_config.with_bot_name(bot_name.clone());
    }
    if let Some(key) = &access_key {
        server_config = server_config.with_access_key(key.clone());
    }

    let bot = Arc::new(EchoBot);

    if !cli.skip_settings_sync {
        let client_config = ClientConfig::new();
        let http_client = reqwest::Client::new();
        sync_settings(
            &http_client,
            &client_config.registry_base_url,
            cli.bot_name.as_deref(),
            access_key.as_deref(),
            bot.as_ref(),
        )
        .await;
    }

    let host = BotHost::new(bot, server_config);
    let router = host.into_router();

    let addr = format!("0.0.0.0:{}", cli.port);
    log::info!("listening on {addr}");
    poe_bot_runtime::logger::log(format!("server starting on {addr}"));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {addr}: {err}"));
    axum::serve(listener, router)
        .await
        .unwrap_or_else(|err| panic!("server error: {err}"));
}
