use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use crate::config::Config;
use crate::executor::Val;
use crate::session::{
    describe_error, IncomingMessage, InvocationContext, MessageSource, Renderer, RunOutcome,
    Session,
};
use crate::tasks::TaskRegistry;

/// Channel id used for the terminal
const STDIN_CHANNEL_ID: u64 = 0;

#[derive(Parser)]
#[command(name = "flowrepl")]
#[command(about = "Flowrepl - run Flow code interactively", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Discard variables after every run
    #[arg(long, global = true)]
    pub no_retain: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session on stdin
    Repl {
        /// Run every line, not only lines starting with the line prefix
        #[arg(long)]
        no_prefix: bool,
    },

    /// Run a file and print what it produces
    Run {
        /// Source file
        file: PathBuf,

        /// Print an inspection report for every value instead
        #[arg(short = 'i', long = "inspect")]
        inspect: bool,
    },

    /// Print the compiled form of a file as JSON
    Ast {
        /// Source file
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let require_prefix = match &cli.command {
        Commands::Repl { no_prefix: true } => Some(false),
        _ => None,
    };
    let config = Config::builder()
        .config_path(cli.config.clone())
        .retain(cli.no_retain.then_some(false))
        .require_prefix(require_prefix)
        .build()?;

    match cli.command {
        Commands::Repl { .. } => {
            let registry = TaskRegistry::new();
            spawn_interrupt_handler(registry.clone());

            let mut session = Session::new(&config).with_registry(registry);
            let mut source = StdinSource::new();
            let mut renderer = StdoutRenderer;

            let exit = session
                .repl(&terminal_context(), &mut source, &mut renderer)
                .await;
            debug!(?exit, "repl finished");
        }

        Commands::Run { file, inspect } => {
            let source = read_source(&file).await?;
            let registry = TaskRegistry::new();
            spawn_interrupt_handler(registry.clone());

            let mut session = Session::new(&config).with_registry(registry);
            let mut renderer = StdoutRenderer;
            let ctx = terminal_context().with_message(source.clone());

            let outcome = if inspect {
                session.python_inspect(&ctx, &source, &mut renderer).await
            } else {
                session.python(&ctx, &source, &mut renderer).await
            };

            match outcome {
                Ok(RunOutcome::Completed) => {}
                Ok(RunOutcome::Cancelled) => eprintln!("Cancelled."),
                Err(e) => bail!(describe_error(&e)),
            }
        }

        Commands::Ast { file } => {
            let source = read_source(&file).await?;
            let session = Session::new(&config);
            println!("{}", session.ast(&source)?);
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

async fn read_source(file: &Path) -> Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))
}

fn terminal_context() -> InvocationContext {
    let user = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
    InvocationContext::new(user, "stdin", STDIN_CHANNEL_ID)
}

/// Ctrl-C cancels whatever runs; with nothing running it exits
fn spawn_interrupt_handler(registry: TaskRegistry) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if registry.cancel_all() == 0 {
                std::process::exit(130);
            }
        }
    });
}

/// Prints values to stdout, notices to stderr
struct StdoutRenderer;

#[async_trait]
impl Renderer for StdoutRenderer {
    async fn render(&mut self, value: &Val) -> Option<Val> {
        match value {
            Val::Str(s) => println!("{}", s),
            other => println!("{}", other.repr()),
        }
        None
    }

    async fn render_text(&mut self, text: &str) {
        eprintln!("{}", text);
    }
}

/// Every stdin line is a message from the terminal user
struct StdinSource {
    author: String,
    lines: Lines<BufReader<Stdin>>,
}

impl StdinSource {
    fn new() -> Self {
        Self {
            author: terminal_context().author,
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl MessageSource for StdinSource {
    async fn next_message(&mut self) -> Option<IncomingMessage> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(IncomingMessage::new(
                self.author.clone(),
                STDIN_CHANNEL_ID,
                line,
            )),
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "stdin closed");
                None
            }
        }
    }
}
