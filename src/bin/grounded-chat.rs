//! Interactive chat against a hosted deployment or the local proxy backend.
//!
//! # Usage
//!
//! ```bash
//! # Direct mode: ENDPOINT_URL, DEPLOYMENT_NAME and AZURE_OPENAI_API_KEY must be set
//! grounded-chat
//!
//! # Set a system prompt and sampling
//! grounded-chat --system "Answer from the handbook" --temperature 0.2 --max-tokens 800
//!
//! # Stream from the proxy backend
//! grounded-chat --proxy --backend-url http://localhost:8000/
//! ```
//!
//! Settings are read from the environment, after loading `.env` if present.
//! Set `RUST_LOG=grounded_chat=debug` to see request logs on stderr.

use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use grounded_chat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use grounded_chat::{
    AzureOpenAI, ChatBackend, DirectBackend, ERROR_SENTINEL, Environment, Error, ModelSettings,
    ProxyBackend, ProxyClient, ProxySettings, Result, RetrievalStatus, SearchSettings,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("grounded-chat [OPTIONS]");
    let proxy = args.proxy;
    let backend_url = args.backend_url.clone();
    let config = match ChatConfig::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{ERROR_SENTINEL} {err}");
            return ExitCode::FAILURE;
        }
    };

    let env = Environment::from_process();
    let result = if proxy {
        start_proxy(&env, backend_url, config).await
    } else {
        start_direct(&env, config).await
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(kind = ?err.kind(), "startup failed");
            eprintln!("{ERROR_SENTINEL} {err}");
            ExitCode::FAILURE
        }
    }
}

async fn start_direct(env: &Environment, config: ChatConfig) -> Result<()> {
    let model = ModelSettings::from_env(env)?;
    let search = SearchSettings::from_env(env);
    let client = AzureOpenAI::new(&model)?;
    let status = search.status();

    let mut banner = vec![
        format!(
            "Model: {} · Endpoint: {}",
            model.deployment,
            model.endpoint_label()
        ),
        status.to_string(),
    ];
    if status == RetrievalStatus::Partial {
        banner.push(
            "Set SEARCH_ENDPOINT, SEARCH_INDEX_NAME and SEARCH_KEY to enable retrieval."
                .to_string(),
        );
    }
    let session = ChatSession::new(DirectBackend::new(client, search), config);
    run(session, &banner).await
}

async fn start_proxy(
    env: &Environment,
    backend_url: Option<String>,
    config: ChatConfig,
) -> Result<()> {
    let mut settings = ProxySettings::from_env(env);
    if let Some(url) = backend_url {
        settings = settings.with_base_url(url);
    }
    let client = ProxyClient::new(&settings)?;
    let backend = ProxyBackend::new(client, settings.idle_timeout);
    let banner = vec![backend.describe()];
    run(ChatSession::new(backend, config), &banner).await
}

async fn run<B: ChatBackend>(mut session: ChatSession<B>, banner: &[String]) -> Result<()> {
    let mut renderer = PlainTextRenderer::with_color(session.config().use_color);
    let mut rl = DefaultEditor::new()
        .map_err(|e| Error::client_init(format!("failed to initialise line editor: {e}"), None))?;

    // Ctrl+C trips the token of the turn in flight.
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    let handler_token = Arc::clone(&current);
    ctrlc::set_handler(move || {
        if let Ok(token) = handler_token.lock() {
            token.cancel();
        }
    })
    .map_err(|e| {
        Error::client_init(
            format!("failed to install Ctrl+C handler: {e}"),
            Some(Box::new(e)),
        )
    })?;

    println!("Grounded Chat");
    for line in banner {
        renderer.print_info(line);
    }
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let line = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        if let Some(cmd) = parse_command(line) {
            if !handle_command(cmd, &mut session, &mut renderer) {
                println!("Goodbye!");
                break;
            }
            continue;
        }

        let cancel = CancellationToken::new();
        if let Ok(mut slot) = current.lock() {
            *slot = cancel.clone();
        }

        println!("Assistant:");
        renderer.start_response();
        let reply = session.send(line, &mut renderer, &cancel).await;
        match &reply.error {
            Some(err) if err.is_abort() => renderer.print_interrupted(),
            Some(_) => {
                if let Some(annotation) = reply.error_annotation() {
                    renderer.print_error(&annotation);
                }
            }
            None => {}
        }
        renderer.finish_response();
    }

    Ok(())
}

/// Apply one slash command.  Returns false when the REPL should exit.
fn handle_command<B: ChatBackend>(
    cmd: ChatCommand,
    session: &mut ChatSession<B>,
    renderer: &mut PlainTextRenderer,
) -> bool {
    match cmd {
        ChatCommand::Quit => return false,
        ChatCommand::Clear(seed) => {
            let seeded = seed.is_some();
            session.reset(seed);
            if seeded {
                renderer.print_info("Conversation cleared and seeded with a system message.");
            } else {
                renderer.print_info("Conversation cleared.");
            }
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {line}");
            }
        }
        ChatCommand::System(prompt) => {
            let restored = prompt.is_none();
            session.set_system_prompt(prompt);
            if restored {
                renderer.print_info("System prompt restored to the default.");
            } else {
                renderer.print_info(&format!("System prompt set to: {}", session.system_prompt()));
            }
        }
        ChatCommand::MaxTokens(value) => match session.set_max_tokens(value) {
            Ok(()) => renderer.print_info(&format!("max_tokens set to {value}")),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Temperature(value) => match session.set_temperature(value) {
            Ok(()) => renderer.print_info(&format!("temperature set to {value:.2}")),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Backend(url) => match session.set_backend_address(&url) {
            Ok(()) => renderer.print_info(&session.backend().describe()),
            Err(err) => renderer.print_error(&err.to_string()),
        },
        ChatCommand::Stats => print_stats(session),
        ChatCommand::ShowConfig => print_config(session),
        ChatCommand::Invalid(message) => renderer.print_error(&message),
    }
    true
}

fn print_stats<B: ChatBackend>(session: &ChatSession<B>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      {}", stats.backend);
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Requests: {} ({} failed)",
        stats.total_requests, stats.failed_turns
    );
    println!(
        "      Total tokens: {} prompt / {} completion",
        stats.total_prompt_tokens, stats.total_completion_tokens
    );
    if let Some(prompt) = stats.last_turn_prompt_tokens {
        let completion = stats.last_turn_completion_tokens.unwrap_or(0);
        println!("      Last turn tokens: {prompt} prompt / {completion} completion");
    }
    match stats.last_message_at.and_then(|at| at.format(&Rfc3339).ok()) {
        Some(at) => println!("      Last reply: {at}"),
        None => println!("      Last reply: (none)"),
    }
}

fn print_config<B: ChatBackend>(session: &ChatSession<B>) {
    let stats = session.stats();
    println!("    Current Configuration:");
    println!("      {}", stats.backend);
    println!("      Temperature: {:.2}", stats.temperature);
    println!("      Max tokens: {}", stats.max_tokens);
    println!("      System prompt: {}", stats.system_prompt);
}
