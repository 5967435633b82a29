//! aerochat binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Connect to the generation service and pick a model
//! 3. Warm the model up
//! 4. Run the interactive turn loop over stdin until `/stop` or end of input

mod cli;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use aerochat_chat::stream::{EarlyStopPolicy, TokenSink};
use aerochat_chat::{GenerationService, OllamaClient, TurnOrchestrator, TurnOutcome};
use aerochat_core::config::AeroConfig;

use cli::CliArgs;

type InputLines = Lines<BufReader<Stdin>>;

/// Prints fragments to stdout as they arrive.
struct StdoutSink;

impl TokenSink for StdoutSink {
    fn on_fragment(&mut self, fragment: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(fragment.as_bytes());
        let _ = out.flush();
    }

    fn on_finish(&mut self) {
        println!();
    }
}

fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

/// Ask the user to pick one of `models`, by number or by name.
async fn select_model(
    models: &[String],
    input: &mut InputLines,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    println!("Available models:");
    for (i, name) in models.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }

    loop {
        prompt("Select a model: ");
        let Some(line) = input.next_line().await? else {
            return Ok(None);
        };
        let choice = line.trim();
        if let Ok(n) = choice.parse::<usize>() {
            if (1..=models.len()).contains(&n) {
                return Ok(Some(models[n - 1].clone()));
            }
        }
        if let Some(name) = models.iter().find(|m| m.as_str() == choice) {
            return Ok(Some(name.clone()));
        }
        println!("Enter a number between 1 and {}.", models.len());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. Parsed before tracing starts so its log level applies.
    let config_file = args.resolve_config_path();
    let loaded = if config_file.exists() {
        AeroConfig::load(&config_file).map(Some)
    } else {
        Ok(None)
    };
    let log_level = match &loaded {
        Ok(Some(config)) => args.resolve_log_level(&config.general.log_level),
        _ => args.resolve_log_level(&AeroConfig::default().general.log_level),
    };

    // Tracing. stdout belongs to the conversation, logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting aerochat v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(Some(config)) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Ok(None) => {
            tracing::info!(path = %config_file.display(), "No config file, using defaults");
            AeroConfig::default()
        }
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    if let Some(locale) = &args.locale {
        config.general.default_locale = locale.clone();
    }
    if args.translate {
        config.translation.enabled = true;
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    // Generation service.
    let client = Arc::new(OllamaClient::new(
        config.generation.base_url.clone(),
        config.generation.timeout_secs,
    ));
    let models = match client.list_models().await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => {
            tracing::error!(url = %client.base_url(), "Generation service has no models installed");
            return Err("no models available".into());
        }
        Err(e) => {
            tracing::error!(url = %client.base_url(), error = %e, "Generation service unreachable");
            return Err(e.into());
        }
    };

    let model = match args.resolve_model(config.generation.model.as_deref()) {
        Some(model) => {
            if !models.contains(&model) {
                tracing::warn!(model = %model, "Model not in the service's model list");
            }
            model
        }
        None => match select_model(&models, &mut input).await? {
            Some(model) => model,
            None => return Ok(()),
        },
    };

    if config.generation.warm_up {
        if let Err(e) = client.warm_up(&model).await {
            tracing::error!(model = %model, error = %e, "Model warm-up failed");
            return Err(e.into());
        }
    }

    let mut orchestrator = TurnOrchestrator::from_config(&config, model.clone(), client)?;
    if args.no_early_stop {
        orchestrator = orchestrator.with_early_stop(EarlyStopPolicy::disabled());
    }

    println!(
        "Chatting with {} in '{}'. Commands: /lang <code>, /stop",
        model,
        orchestrator.locale()
    );

    // === Turn loop ===

    let mut sink = StdoutSink;
    loop {
        prompt("> ");
        let Some(line) = input.next_line().await? else {
            break;
        };

        match orchestrator.handle_line(&line, &mut sink).await {
            Ok(TurnOutcome::Telemetry { text, metrics, .. }) => {
                println!("{}", text);
                println!("[{}]", metrics);
            }
            Ok(TurnOutcome::Answer {
                text,
                translated,
                metrics,
            }) => {
                if translated {
                    println!("{}", text);
                }
                println!("[{}]", metrics);
            }
            Ok(TurnOutcome::LanguageChanged { locale }) => {
                println!("Language set to '{}'.", locale);
            }
            Ok(TurnOutcome::LocaleRequired { available }) => {
                prompt(&format!("Language ({}): ", available.join(", ")));
                let Some(code) = input.next_line().await? else {
                    break;
                };
                match orchestrator.switch_language(code.trim()) {
                    Ok(_) => println!("Language set to '{}'.", orchestrator.locale()),
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            Ok(TurnOutcome::Stopped) => break,
            Ok(TurnOutcome::Ignored) => {}
            Err(e) => {
                eprintln!("error: {}", e);
                if orchestrator.state().is_terminal() {
                    break;
                }
            }
        }
    }

    let session = orchestrator.session();
    tracing::info!(
        session = %session.id,
        turns = session.turns_handled,
        "Session ended"
    );
    println!(
        "Session {} ended: {} turns since {}.",
        session.id,
        session.turns_handled,
        session.started_at.to_rfc3339()
    );

    Ok(())
}
