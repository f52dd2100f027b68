
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, ConfigError, DocsConfig, GithubConfig, OllamaConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Docs RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Documentation Source").bold().yellow());
    eprintln!("Choose the repository and folder holding the documentation.");
    eprintln!();

    configure_github(&mut config.github)?;
    configure_docs(&mut config.docs)?;

    eprintln!();
    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embeddings and answers.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before indexing.");
    }

    if config.github.token().is_none() {
        eprintln!(
            "{}",
            style(format!(
                "⚠ {} is not set; GitHub requests will be unauthenticated and heavily rate limited",
                config.github.token_env
            ))
            .yellow()
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Repository:").bold().yellow());
    eprintln!(
        "  Repository: {}",
        style(format!("{}/{}", config.github.owner, config.github.repo)).cyan()
    );
    eprintln!("  API: {}", style(&config.github.api_url).cyan());
    eprintln!(
        "  Token: {}",
        if config.github.token().is_some() {
            style(format!("set via {}", config.github.token_env)).green()
        } else {
            style(format!("{} not set", config.github.token_env)).yellow()
        }
    );

    eprintln!();
    eprintln!("{}", style("Documentation:").bold().yellow());
    eprintln!("  Root: {}", style(&config.docs.docs_root).cyan());
    eprintln!("  Extension: {}", style(&config.docs.file_extension).cyan());
    eprintln!("  Delimiter: {}", style(&config.docs.section_delimiter).cyan());
    eprintln!("  Source URL: {}", style(&config.docs.source_url).cyan());

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Embedding Model: {}", style(&config.ollama.model).cyan());
    eprintln!(
        "  Completion Model: {}",
        style(&config.ollama.completion_model).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!(
        "  Threshold: {}",
        style(config.retrieval.match_threshold).cyan()
    );
    eprintln!("  Matches: {}", style(config.retrieval.match_count).cyan());
    eprintln!(
        "  Character Budget: {}",
        style(config.retrieval.char_budget).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if config_dir.join("config.toml").exists() {
        let config = Config::load(config_dir)?;
        eprintln!("{}", style("Found existing configuration.").green());
        Ok(config)
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Config::load(config_dir)
    }
}

fn configure_github(github: &mut GithubConfig) -> Result<()> {
    let owner: String = Input::new()
        .with_prompt("Repository owner")
        .default(github.owner.clone())
        .interact_text()?;

    let repo: String = Input::new()
        .with_prompt("Repository name")
        .default(github.repo.clone())
        .interact_text()?;

    github.set_repository(owner, repo)?;

    Ok(())
}

fn configure_docs(docs: &mut DocsConfig) -> Result<()> {
    let docs_root: String = Input::new()
        .with_prompt("Documentation folder")
        .default(docs.docs_root.clone())
        .interact_text()?;

    let source_url: String = Input::new()
        .with_prompt("Published documentation URL")
        .default(docs.source_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            url::Url::parse(input).map_err(|_| ConfigError::InvalidUrl(input.clone()))?;
            Ok(())
        })
        .interact_text()?;

    docs.strip_prefix = format!("{}/", docs_root.trim_end_matches('/'));
    docs.docs_root = docs_root;
    docs.set_source_url(source_url)?;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let completion_model: String = Input::new()
        .with_prompt("Completion model")
        .default(ollama.completion_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(ollama.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_completion_model(completion_model)?;
    ollama.set_embedding_dimension(dimension)?;

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
