use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use nlu_core::slots::self_report_conflicts;
use nlu_core::{
    parse_entity_output_with_report, parse_intent_output_with_report, ConfigError,
    EntityPromptContext, IntentPromptContext, NluConfig, PromptRenderer, RenderError,
    RequiredKeysRegistry,
};

#[derive(Debug, Parser)]
#[command(
    name = "nlu",
    about = "Render NLU prompts and parse model completions",
    after_help = "Examples:\n  nlu render-entity --intent ask_price --message \"how much?\" --language eng\n  nlu parse-entity < completion.txt\n  nlu missing --intent ask_price < completion.txt"
)]
struct Cli {
    #[arg(long, global = true, help = "TOML config file; NLU_* variables override it")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Parse an entity-extraction completion from stdin into JSON")]
    ParseEntity {
        #[arg(long, help = "Include dropped-record diagnostics")]
        report: bool,
    },
    #[command(about = "Parse an intent-classification completion from stdin into JSON")]
    ParseIntent {
        #[arg(long, help = "Include dropped-record diagnostics")]
        report: bool,
    },
    #[command(about = "Compute unfilled slots for an intent from an entity completion on stdin")]
    Missing {
        #[arg(long)]
        intent: String,
    },
    #[command(about = "Print the entity-extraction prompt")]
    RenderEntity {
        #[arg(long)]
        intent: String,
        #[arg(long)]
        message: String,
        #[arg(long, default_value = "eng")]
        language: String,
    },
    #[command(about = "Print the intent-classification prompt")]
    RenderIntent,
    #[command(about = "Print the persona system prompt")]
    RenderPersona {
        #[arg(long, help = "Override the configured persona type")]
        mbti: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();

    match run(Cli::parse()) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<NluConfig, ConfigError> {
    let config = match path {
        Some(path) => NluConfig::load(path)?,
        None => NluConfig::default(),
    };
    Ok(config.with_env_overrides(std::env::vars()))
}

fn read_stdin() -> Result<String> {
    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read completion from stdin")?;
    Ok(raw)
}

fn run(cli: Cli) -> Result<String> {
    let config = load_config(cli.config.as_ref()).context("failed to load configuration")?;

    let output = match cli.command {
        Command::ParseEntity { report } => {
            let (parsed, diagnostics) = parse_entity_output_with_report(&read_stdin()?);
            if report {
                json!({ "output": parsed, "report": diagnostics })
            } else {
                serde_json::to_value(parsed)?
            }
        }
        Command::ParseIntent { report } => {
            let (parsed, diagnostics) = parse_intent_output_with_report(&read_stdin()?);
            if report {
                json!({ "output": parsed, "report": diagnostics })
            } else {
                serde_json::to_value(parsed)?
            }
        }
        Command::Missing { intent } => {
            let registry = RequiredKeysRegistry::from_config(&config);
            let required = registry.required_keys_for(&intent);
            let parsed = parse_entity_output_with_report(&read_stdin()?).0;
            json!({
                "intent": intent,
                "required": required,
                "missing": parsed.missing_keys(&required),
                "self_reported": parsed.missing,
                "conflicts": self_report_conflicts(&parsed.entities, &parsed.missing),
            })
        }
        Command::RenderEntity { intent, message, language } => {
            let registry = RequiredKeysRegistry::from_config(&config);
            let ctx = EntityPromptContext::for_intent(&config, &registry, &intent, &message, &language);
            return render(|r| r.render_entity_prompt(&ctx));
        }
        Command::RenderIntent => {
            let ctx = IntentPromptContext::from(&config);
            return render(|r| r.render_intent_prompt(&ctx));
        }
        Command::RenderPersona { mbti } => {
            let mut persona = config.persona.clone();
            if let Some(mbti) = mbti {
                persona.mbti_type = mbti;
            }
            return render(|r| r.render_persona_prompt(&persona));
        }
    };

    Ok(serde_json::to_string_pretty(&output)?)
}

fn render(f: impl FnOnce(&PromptRenderer) -> Result<String, RenderError>) -> Result<String> {
    let renderer = PromptRenderer::new().context("failed to load embedded templates")?;
    match f(&renderer) {
        Ok(prompt) => Ok(prompt),
        Err(RenderError::Config(ConfigError::ProfileNotFound { profile })) => {
            let known = renderer.profiles().names().collect::<Vec<_>>().join(", ");
            anyhow::bail!("persona profile `{profile}` not found (known: {known})")
        }
        Err(err) => Err(err).context("failed to render prompt"),
    }
}
