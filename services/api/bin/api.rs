//! Main Entrypoint for the Lesson API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the prompt templates.
//! 3. Initializing shared services (the LLM-backed lesson planner and the
//!    speech recognizer proxy).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::{collections::HashMap, fs, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tutor_api::{
    config::{Config, Provider},
    router::create_router,
    speech::WhisperProxy,
    state::AppState,
};
use tutor_core::{
    curriculum::LlmLessonPlanner,
    llm_client::{LlmClient, OpenAICompatibleClient},
};

const REQUIRED_PROMPTS: [&str; 3] = ["start_lesson", "teach_step", "answer_doubt"];

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }

    for key in REQUIRED_PROMPTS {
        if !prompts.contains_key(key) {
            anyhow::bail!("{key}.md not found in prompts directory");
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;

    let openai_config = match &config.provider {
        Provider::Ollama => {
            info!(url = %config.ollama_url, "Using Ollama provider.");
            // Ollama ignores the key, but the client always sends one.
            OpenAIConfig::new()
                .with_api_key("ollama")
                .with_api_base(&config.ollama_url)
        }
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY must be set for 'openai' provider")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://api.openai.com/v1")
        }
    };

    let llm_client: Arc<dyn LlmClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let app_state = Arc::new(AppState {
        planner: Arc::new(LlmLessonPlanner::new(llm_client, prompts)),
        recognizer: Arc::new(WhisperProxy::new(
            reqwest::Client::new(),
            config.whisper_url.clone(),
        )),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        whisper_url = %config.whisper_url,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
