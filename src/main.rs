use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

use qunbot::application::errors::BotError;
use qunbot::application::services::{AccessRequest, Admission};
use qunbot::bootstrap;
use qunbot::domain::entities::{GroupRole, Scope};
use qunbot::domain::traits::Bot;
use qunbot::infrastructure::adapters::{ConsoleAdapter, Session};
use qunbot::infrastructure::config::Config;

#[derive(Parser)]
#[command(name = "qunbot")]
#[command(about = "Per-group plugin switches, permissions and cooldowns for a chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot on the console adapter
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
    /// Show plugin switches for a group, or the global ones
    Status {
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Ask the gate whether a user may run a command
    Check {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        group: Option<String>,
        #[arg(short = 'm', long)]
        command: String,
        /// member, admin or owner
        #[arg(short, long, default_value = "member")]
        role: String,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => run_bot(&cli.config),
        Commands::Version => {
            println!("qunbot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(),
        Commands::Status { group } => show_status(&cli.config, group),
        Commands::Check { user, group, command, role } => check_access(&cli.config, &user, group.as_deref(), &command, &role),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(config_path: &str) -> Config {
    let config = if Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        })
    } else {
        tracing::info!("No config at {}, using defaults", config_path);
        Config::default()
    };
    config.with_env_overrides()
}

fn run_bot(config_path: &str) -> Result<(), BotError> {
    let config = load_config(config_path);
    tracing::info!("Starting qunbot: {}", config.bot.name);

    let dispatcher = Arc::new(bootstrap::build(&config)?);

    let Some(console) = config.adapters.console.as_ref().filter(|c| c.enabled) else {
        return Err(BotError::Adapter("No adapter enabled".to_string()));
    };

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("Failed to start runtime: {}", e)))?;

    rt.block_on(async {
        let bot = ConsoleAdapter::new(config.bot.name.clone(), dispatcher, Session::from(console));
        let info = bot.bot_info();
        tracing::info!("Bot started: @{}", info.username);
        bot.start().await
    })
}

fn show_status(config_path: &str, group: Option<String>) -> Result<(), BotError> {
    let config = load_config(config_path);
    let dispatcher = bootstrap::build(&config)?;
    let scope = group.map(Scope::group).unwrap_or(Scope::Global);

    let manager = dispatcher.manager().read()
        .map_err(|_| BotError::Internal("Lock poisoned".to_string()))?;

    println!("Plugin switches ({}):", scope);
    for status in manager.registry().statuses(&scope) {
        println!(
            "  {:<24} {:<8} {}",
            status.key.to_string(),
            if status.enabled { "ON" } else { "OFF" },
            status.label
        );
    }

    if let Some(group) = scope.group_id() {
        let cooldowns = manager.cooldowns().durations_for(group);
        if !cooldowns.is_empty() {
            println!("Cooldowns:");
            for (key, seconds) in cooldowns {
                println!("  {:<24} {}s", key.to_string(), seconds);
            }
        }
    }
    Ok(())
}

fn check_access(config_path: &str, user: &str, group: Option<&str>, command: &str, role: &str) -> Result<(), BotError> {
    let role = GroupRole::parse(role)
        .ok_or_else(|| BotError::Internal(format!("Unknown role: {}", role)))?;

    let config = load_config(config_path);
    let dispatcher = bootstrap::build(&config)?;

    let Some(invocation) = dispatcher.lookup(command) else {
        println!("Unknown command: {}", command);
        return Ok(());
    };

    let manager = dispatcher.manager().read()
        .map_err(|_| BotError::Internal("Lock poisoned".to_string()))?;
    let request = AccessRequest::new(user, group, &invocation.command)
        .with_role(role)
        .with_plugin(invocation.key.as_ref().map(|k| k.plugin.as_str()))
        .with_required(invocation.required);

    let verdict = match manager.admit(&request, invocation.key.as_ref(), chrono::Utc::now()) {
        Admission::Allowed => "allowed".to_string(),
        Admission::Disabled(key) => format!("ignored, {} is disabled", key),
        Admission::Denied => "denied".to_string(),
        Admission::CoolingDown(seconds) => format!("cooling down, {}s left", seconds),
    };
    println!("{} -> {}: {}", user, invocation.command, verdict);

    if let Some(rule) = manager.gate().matching_rule(&request) {
        println!("Matched rule: {}", rule);
    }
    Ok(())
}

fn init_config() -> Result<(), BotError> {
    let config = Config::default();
    let yaml = serde_yaml::to_string(&config)
        .map_err(|e| BotError::Internal(format!("Failed to render config: {}", e)))?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
