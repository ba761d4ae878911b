use clap::Parser;
use standin_http::config::{self, RateLimitSettings, Settings};
use standin_http::dispatch::WebhookDispatcher;
use standin_http::generators::{Generators, SequenceRegistry};
use standin_http::handler::RequestOrchestrator;
use standin_http::rate_limit::RateLimiter;
use standin_http::registry;
use standin_http::server::Server;
use standin_http::template::TemplateEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "standin-http")]
struct Args {
    #[arg(long, env = "STANDIN_HOST", default_value = "0.0.0.0")]
    host: String,
    #[arg(short, long, env = "STANDIN_PORT", default_value = "8000")]
    port: u16,
    /// Directory holding the YAML route declarations.
    #[arg(short, long, env = "STANDIN_CONFIG_DIR", default_value = "config")]
    config_dir: String,
    /// Base URL substituted for {$webhook_url} markers.
    #[arg(long, env = "STANDIN_WEBHOOK_URL", default_value = "")]
    webhook_base_url: String,
    #[arg(long, env = "STANDIN_WEBHOOK_TIMEOUT_SECS", default_value = "10")]
    webhook_timeout_secs: u64,
    /// Drop in-flight webhooks when the inbound request is aborted instead of
    /// letting them complete.
    #[arg(long, env = "STANDIN_WEBHOOK_NO_DETACH")]
    webhook_no_detach: bool,
    /// Requests admitted per client+route per window; 0 disables the guard.
    #[arg(long, env = "STANDIN_RATE_LIMIT", default_value = "0")]
    rate_limit: u32,
    #[arg(long, env = "STANDIN_RATE_LIMIT_PERIOD_SECS", default_value = "60")]
    rate_limit_period_secs: u64,
}

impl Args {
    fn into_settings(self) -> (Settings, String) {
        let settings = Settings {
            host: self.host,
            port: self.port,
            webhook_base_url: self.webhook_base_url,
            webhook_timeout_secs: self.webhook_timeout_secs,
            webhook_detach: !self.webhook_no_detach,
            rate_limit: (self.rate_limit > 0).then_some(RateLimitSettings {
                limit: self.rate_limit,
                period_secs: self.rate_limit_period_secs,
            }),
        };
        (settings, self.config_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let (settings, config_dir) = args.into_settings();

    let declarations = config::load_declarations(&config_dir)?;
    let table = registry::merge(declarations)?;
    info!(
        "route table built: {} route(s), {} diagnostic(s)",
        table.routes.len(),
        table.diagnostics.len()
    );
    for diagnostic in &table.diagnostics {
        warn!("{diagnostic}");
    }

    let sequences = Arc::new(SequenceRegistry::new());
    let engine = Arc::new(TemplateEngine::new(Generators::new(
        settings.webhook_base_url.clone(),
        sequences,
    )));
    let webhooks = Arc::new(WebhookDispatcher::new(Duration::from_secs(
        settings.webhook_timeout_secs,
    ))?);
    let orchestrator = Arc::new(RequestOrchestrator::new(
        table,
        engine,
        webhooks,
        settings.webhook_detach,
    ));

    let rate_limiter = settings.rate_limit.as_ref().map(|limits| {
        Arc::new(RateLimiter::new(
            limits.limit,
            Duration::from_secs(limits.period_secs),
        ))
    });

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    Server::new(orchestrator, rate_limiter).run(addr).await
}
