use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use inbox_agent::agent::EmailAgent;
use inbox_agent::agent::client::GroqClient;
use inbox_agent::auth::key_store;
use inbox_agent::config::{Config, load_config};
use inbox_agent::process::process_inbox;
use inbox_agent::server::routes::App;
use inbox_agent::server::{ServerConfig, run_server};
use inbox_agent::store::json::JsonStore;
use inbox_agent::store::repo::InboxRepository;

#[derive(Parser)]
#[command(name = "inbox_agent")]
#[command(about = "Mock inbox with LLM triage (web API + static UI)", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Open the UI in the default browser
        #[arg(long)]
        open: bool,
    },

    /// Categorize and extract action items for every email, then exit
    Process,

    /// Clear categories, action items and drafts from the inbox file
    Reset,

    /// Store the inference API key in keyring
    SetApiKey,
}

fn open_store(cfg: &Config) -> JsonStore {
    JsonStore::open(&cfg.inbox_path, &cfg.prompts_path)
}

fn build_agent(cfg: &Config) -> Result<Option<EmailAgent>> {
    let Some(api_key) = key_store::resolve_api_key() else {
        log::warn!(
            "no API key in keyring or {}; inference endpoints are disabled",
            key_store::API_KEY_ENV
        );
        return Ok(None);
    };
    let client = GroqClient::new(api_key, &cfg.model, &cfg.api_base)?;
    log::info!("using model {}", client.model());
    Ok(Some(EmailAgent::new(client)))
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetApiKey => {
            eprintln!("Paste API key (end with Ctrl-D):");
            let mut key = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut key)?;
            let key = key.trim();
            if key.is_empty() {
                return Err(anyhow!("empty API key"));
            }
            key_store::save_api_key(key)?;
            println!("Saved API key into keyring");
            Ok(())
        }

        Command::Reset => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e:#}"))?;
            let mut store = open_store(&cfg);
            store.reset_inbox();
            println!("Inbox reset complete.");
            Ok(())
        }

        Command::Process => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e:#}"))?;
            let agent = build_agent(&cfg)?
                .ok_or_else(|| anyhow!("no API key configured; run set-api-key or set {}", key_store::API_KEY_ENV))?;
            let mut store = open_store(&cfg);
            let count = process_inbox(&mut store, &agent);
            println!("Processed {count} emails");
            Ok(())
        }

        Command::Serve { bind, open } => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e:#}"))?;
            let agent = build_agent(&cfg)?;
            let mut app = App::new(open_store(&cfg), agent);

            let server_cfg = ServerConfig {
                bind: bind.unwrap_or_else(|| cfg.bind.clone()),
                static_dir: cfg.static_dir.clone(),
                open_browser: open,
            };

            run_server(&mut app, &server_cfg)
        }
    }
}
