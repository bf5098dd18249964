mod client;
mod config;
mod controller;
mod conversation;
mod highlight;
mod logging;
mod markdown;
mod sidebar;
mod storage;
mod store;
mod transcript;
mod tui;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use config::{ConfigFile, ResolvedConfig};
use conversation::Role;

#[derive(Parser, Debug)]
#[command(
    name = "genie",
    about = "Terminal chat client for an AI Genie answering service",
    long_about = None,
)]
struct Args {
    /// Question to ask directly (omit to enter interactive TUI mode)
    question: Option<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "GENIE_PROFILE")]
    profile: Option<String>,

    /// Override endpoint URL
    #[arg(long, env = "GENIE_ENDPOINT")]
    endpoint: Option<String>,

    /// Where conversations and the log are kept
    #[arg(long, env = "GENIE_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Write a default config file to ~/.config/genie/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: genie");
        return Ok(ExitCode::SUCCESS);
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        generate_completions(shell_name)?;
        return Ok(ExitCode::SUCCESS);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(ExitCode::SUCCESS);
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.endpoint.as_deref(),
        args.data_dir.as_deref(),
    );

    // Logging is best effort; the app works without it
    let _log_guard = match logging::init(&resolved.data_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("  logging disabled: {e:#}");
            None
        }
    };
    tracing::info!(profile = %resolved.profile_name, endpoint = %resolved.endpoint, "starting");

    // ── Single-shot mode (non-TUI) ────────────────────────────────────────────
    // The log guard must outlive this so a failed ask still reaches the log
    if let Some(question) = args.question {
        let answered = run_single_shot(question, resolved).await?;
        return Ok(if answered { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(resolved).await?;
    Ok(ExitCode::SUCCESS)
}

// ── Single-shot mode (plain stdout, no TUI, nothing persisted) ────────────────

/// Ask once and print the answer. `Ok(false)` means the service failed and
/// the apology was printed instead.
async fn run_single_shot(question: String, resolved: ResolvedConfig) -> Result<bool> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("Nothing to ask");
    }

    println!();
    println!("  {}  {}  ·  {}", ui::role_glyph(Role::Assistant), resolved.profile_name, resolved.endpoint);
    println!();

    let client = client::AskClient::new(resolved.endpoint.clone(), resolved.timeout)?;
    match client.ask(question).await {
        Ok(answer) => {
            println!("{}", answer.markdown_source());
            Ok(true)
        }
        Err(e) => {
            tracing::warn!("single-shot ask failed: {e}");
            eprintln!("  ✗ {e}");
            println!("{}", resolved.apology);
            Ok(false)
        }
    }
}

// ── Profiles listing (non-TUI) ────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    println!();
    println!("  Profiles");
    for name in file.profile_names() {
        let Some(p) = file.profiles.get(name) else {
            continue;
        };
        let marker = if name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    endpoint     {}", p.endpoint);
        println!("    timeout      {}s", p.timeout_secs);
        println!("    suggestions  {}", p.suggestions.len());
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "genie", &mut std::io::stdout());
    Ok(())
}
