use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use chat_gate::channels::{Channel, ChannelEvent, CliChannel};
use chat_gate::clock::SystemClock;
use chat_gate::config::GateConfig;
use chat_gate::grants::GrantRegistry;
use chat_gate::limiter::RateLimiter;
use chat_gate::observability::TracingSink;
use chat_gate::responder::{
    ConversationResponder, OpenAiConfig, OpenAiResponder, UnavailableResponder,
};
use chat_gate::router::{Router, RouterDeps};
use chat_gate::session::SessionTracker;
use chat_gate::sweeper::spawn_sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GateConfig::from_env().context("invalid configuration")?;

    // Initialize tracing, optionally mirrored to a daily log file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _log_guard = match config.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "chat-gate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .init();
            None
        }
    };

    run(config).await?;

    tracing::info!("Input closed, shutting down");
    Ok(())
}

/// Wire the gate services and serve the CLI channel until input closes.
async fn run(config: GateConfig) -> chat_gate::Result<()> {
    let clock = Arc::new(SystemClock);
    let sink = Arc::new(TracingSink);

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.clone(),
        clock.clone(),
        sink.clone(),
    ));
    let grants = Arc::new(GrantRegistry::new(clock.clone(), sink.clone()));
    let sessions = Arc::new(SessionTracker::new(clock.clone(), sink.clone()));

    let responder = build_responder(&config)?;

    eprintln!("🛡️  Chat Gate v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Responder: {}", responder.name());
    eprintln!(
        "   Operator: {}",
        config.operator.as_deref().unwrap_or("(none)")
    );
    eprintln!(
        "   Limits: {}/min, {}/hour, {}/day, cooldown {}s",
        config.rate_limit.max_per_minute,
        config.rate_limit.max_per_hour,
        config.rate_limit.max_per_day,
        config.rate_limit.cooldown.num_seconds(),
    );
    eprintln!("   Availability: {}", config.availability);
    eprintln!("   Input: 'sender: text' or 'sender > quoted: text'. Ctrl-D to exit.\n");

    let _sweeper = spawn_sweeper(limiter.clone(), grants.clone(), config.sweep_interval);

    let router = Router::new(
        RouterDeps {
            limiter,
            grants,
            sessions,
            responder,
            sink,
        },
        config.availability,
    );

    let channel = CliChannel::new(config.operator.clone());
    let mut events = channel.start().await?;

    while let Some(event) = events.next().await {
        match event {
            ChannelEvent::Message(msg) => {
                let action = router.process_inbound(&msg).await;
                channel.respond(&msg, &action).await?;
            }
            ChannelEvent::SetAvailability(state) => {
                router.set_operator_availability(state);
                eprint!("Availability set to {state}\n> ");
            }
            ChannelEvent::ShowStats => {
                match router.stats() {
                    Ok(stats) => eprintln!("{}", serde_json::to_string_pretty(&stats)?),
                    Err(e) => eprintln!("stats unavailable: {e}"),
                }
                eprintln!("{}", serde_json::to_string_pretty(&router.counters())?);
                eprint!("> ");
            }
        }
    }
    Ok(())
}

fn build_responder(config: &GateConfig) -> chat_gate::Result<Arc<dyn ConversationResponder>> {
    let Some(api_key) = config.openai_api_key.clone() else {
        return Ok(Arc::new(UnavailableResponder));
    };
    let responder = OpenAiResponder::new(OpenAiConfig::new(api_key, config.model.clone()))?;
    Ok(Arc::new(responder))
}
