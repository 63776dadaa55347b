//! CLI for the coop door controller.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod channel;
mod display;
mod send;
mod shell;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;
use coop::{Clock, Config, Link, Reply, Session};
use tracing_subscriber::EnvFilter;

use crate::display::OutputFormat;

#[derive(Parser)]
#[command(name = "coopctl", version, about = "Control the coop door over its serial link")]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Default)]
pub(crate) struct Globals {
    /// Config file (default: ./coop.toml, then the user config directory).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serial port to open.
    #[arg(long, global = true, value_name = "NAME", conflicts_with = "tcp")]
    port: Option<String>,

    /// Text matched against serial port descriptions.
    #[arg(long, global = true, value_name = "TEXT")]
    hint: Option<String>,

    /// Serial-over-TCP bridge address.
    #[arg(long, global = true, value_name = "ADDR")]
    tcp: Option<String>,

    /// Line speed.
    #[arg(long, global = true, value_name = "N")]
    baud: Option<u32>,

    /// Clock sent by time sync: local, utc or an offset like +01:00.
    #[arg(long, global = true, value_name = "CLOCK")]
    clock: Option<Clock>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive numbered menu (default).
    Shell,

    /// Send a single command.
    Send(send::SendArgs),

    /// Print replies until the channel closes.
    Listen {
        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// List serial ports with their descriptions.
    Ports,

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: CompletionShell,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.globals.verbose);
    if let Err(e) = cli.dispatch() {
        eprintln!("coopctl: {e:#}");
        std::process::exit(1);
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        let globals = self.globals;
        match self.command.unwrap_or(Command::Shell) {
            Command::Shell => {
                let config = load_config(&globals)?;
                shell(&globals, &config)
            }
            Command::Send(args) => {
                let config = load_config(&globals)?;
                let channel = channel::open(&globals, &config)?;
                send::send(&args, channel, session(&globals, &config))
            }
            Command::Listen { format } => {
                let config = load_config(&globals)?;
                send::listen(channel::open(&globals, &config)?, format)
            }
            Command::Ports => ports(),
            Command::Completion { shell } => {
                clap_complete::generate(shell, &mut Self::command(), "coopctl", &mut io::stdout());
                Ok(())
            }
        }
    }
}

fn load_config(globals: &Globals) -> Result<Config> {
    Config::discover(globals.config.as_deref()).context("failed to load config")
}

fn session(globals: &Globals, config: &Config) -> Session {
    Session::new(globals.clock.unwrap_or(config.clock.base))
}

fn shell(globals: &Globals, config: &Config) -> Result<()> {
    println!("Coop Door Client");
    let channel = channel::open(globals, config)?;
    let mut link = Link::start(channel, |reply: Reply| display::print_interleaved(&reply))?;

    let session = session(globals, config);
    println!("Time sync clock: {}", session.clock());
    let stdin = io::stdin();
    shell::Shell::new(stdin.lock(), io::stdout(), session).run(|cmd| link.send(cmd))
}

fn ports() -> Result<()> {
    let ports = coop::list_ports().context("failed to list serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    channel::print_ports(&mut io::stdout(), &ports)?;
    Ok(())
}
