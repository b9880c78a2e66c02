use std::sync::Arc;

use tutor_assist::agent::Agent;
use tutor_assist::channels::{ChannelManager, CliChannel, TelegramChannel, WebChannel};
use tutor_assist::config::TutorConfig;
use tutor_assist::dialogue::DialogueController;
use tutor_assist::llm::create_provider;
use tutor_assist::profile::ProfileStore;
use tutor_assist::tutor::LlmAnswerer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = TutorConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export OPENAI_API_KEY=sk-...  (or set TUTOR_LLM_BACKEND=anthropic)");
        std::process::exit(1);
    });

    eprintln!("📚 Tutor Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Chat WS: ws://0.0.0.0:{}/ws/chat", config.ws_port);
    eprintln!("   Answer timeout: {}s", config.answer_timeout.as_secs());

    // Create LLM provider
    let llm = create_provider(&config.llm)?;
    let answerer =
        Arc::new(LlmAnswerer::new(llm, config.answer_timeout).with_max_tokens(config.max_tokens));

    // Set up channels
    let mut channels = ChannelManager::new();

    if config.cli_enabled {
        channels.add(Box::new(CliChannel::new()));
    }

    // Web chat (WebSocket at /ws/chat); the router must exist before the
    // channel moves into the manager.
    let web_channel = WebChannel::new();
    let app = web_channel.router();
    channels.add(Box::new(web_channel));

    let ws_port = config.ws_port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", ws_port)).await?;
    tokio::spawn(async move {
        tracing::info!(port = ws_port, "Web chat server started");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Web chat server stopped");
        }
    });

    if let Some(telegram) = config.telegram {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if telegram.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                telegram.allowed_users.join(", ")
            }
        );
        channels.add(Box::new(TelegramChannel::new(
            telegram.bot_token,
            telegram.allowed_users,
        )));
    }

    eprintln!("   Channels: {}\n", channels.names().join(", "));
    if config.cli_enabled {
        eprint!("> ");
    }

    let channels = Arc::new(channels);
    let store = Arc::new(ProfileStore::new());
    let controller = Arc::new(DialogueController::new(
        store,
        answerer,
        channels.clone(),
    ));

    let agent = Agent::new(controller, channels);
    agent.run().await?;

    Ok(())
}
