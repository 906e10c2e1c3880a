use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use marketing_ai::config::load_config;
use marketing_ai::notice::PROMPT_MARKER;
use marketing_ai::router::{route, Domain, BANNER};
use marketing_ai::session::{Reply, Services, Session};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log filter variable; falls back to `RUST_LOG`.
const LOG_ENV: &str = "MARKETING_AI_LOG";

#[derive(Debug, Parser)]
#[command(name = "marketing-ai")]
#[command(version)]
#[command(about = "Project-aware AI terminal for the marketing platform")]
struct Cli {
    /// Project root to scan, describe and watch
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Debug-level logs on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start interactive AI chat (default)
    Chat,
    /// Ask a quick question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Audit-related commands (status, analyze, conversions, optimize)
    Audit {
        subcommand: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Ligna integration commands (health, sync, contacts, setup)
    Ligna {
        subcommand: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Deep analysis commands (frontend, backend, database, security)
    Analyze { target: String },
    /// Generate marketing assets (webhook, email, landing, api)
    Generate {
        #[arg(value_name = "TYPE")]
        kind: String,
        #[arg(trailing_var_arg = true)]
        target: Vec<String>,
    },
    /// Test system components (connections, api, integration)
    Test { target: String },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg);
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

fn prompt_marker() {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{PROMPT_MARKER}");
    let _ = out.flush();
}

async fn run_interactive(session: &mut Session) -> Result<()> {
    println!("{BANNER}\n");
    println!("AI Terminal ready. Type \"help\" for commands or \"exit\" to quit.");
    println!("Tip: try \"analyze frontend\" or \"generate email restaurants\".\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt_marker();
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            session.stop_watching();
            println!();
            break;
        };

        let pb = route(&line).calls_model().then(|| spinner("thinking..."));
        let reply = session.handle_input(&line).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        match reply {
            Reply::Nothing => {}
            Reply::Text(text) => println!("\n{text}\n"),
            Reply::Clear(banner) => {
                print!("\x1B[2J\x1B[1;1H");
                println!("{banner}\n");
            }
            Reply::Exit(msg) => {
                println!("{msg}");
                break;
            }
        }
    }
    Ok(())
}

async fn run_one_shot(session: &mut Session, domain: Domain, words: Vec<String>) -> Result<()> {
    let pb = spinner("thinking...");
    let out = session.run_domain(domain, &words).await;
    pb.finish_and_clear();
    println!("{out}");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("Failed to resolve project root {}", cli.root.display()))?;
    let config = load_config(&root);
    tracing::debug!(root = %root.display(), model = %config.model.model, "starting session");

    let interactive = matches!(cli.cmd, None | Some(Command::Chat));
    let services = Services::live(&root, &config, interactive);
    let mut session = Session::new(root, config, services);

    match cli.cmd.unwrap_or(Command::Chat) {
        Command::Chat => run_interactive(&mut session).await,
        Command::Ask { question } => {
            let pb = spinner("thinking...");
            let out = session.ask(&question.join(" ")).await;
            pb.finish_and_clear();
            println!("{out}");
            Ok(())
        }
        Command::Audit { subcommand, args } => {
            run_one_shot(&mut session, Domain::Audit, std::iter::once(subcommand).chain(args).collect()).await
        }
        Command::Ligna { subcommand, args } => {
            run_one_shot(&mut session, Domain::Ligna, std::iter::once(subcommand).chain(args).collect()).await
        }
        Command::Analyze { target } => run_one_shot(&mut session, Domain::Analyze, vec![target]).await,
        Command::Generate { kind, target } => {
            run_one_shot(&mut session, Domain::Generate, std::iter::once(kind).chain(target).collect()).await
        }
        Command::Test { target } => run_one_shot(&mut session, Domain::Test, vec![target]).await,
    }
}
