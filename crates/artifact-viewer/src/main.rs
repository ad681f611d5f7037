use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod stub;

#[derive(Parser)]
#[command(
    name = "artifact-viewer",
    about = "Artifact viewer: run generated code in an isolated sandbox and report diagnostics"
)]
struct Cli {
    /// Config file [default: ~/.artifact-viewer/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Which version to act on. Unset fields fall back to the `[host]` config.
#[derive(Args)]
struct Target {
    /// Store file in the host's JSON shape
    #[arg(long)]
    store: PathBuf,

    #[arg(long)]
    store_id: Option<String>,

    /// Artifact group; without --version the latest version is used
    #[arg(long)]
    group: Option<String>,

    #[arg(long, requires = "group")]
    version: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List groups and versions
    List {
        #[arg(long)]
        store: PathBuf,

        /// Only this store id [default: every store in the file]
        #[arg(long)]
        store_id: Option<String>,
    },
    /// Print a version's code
    Show(Target),
    /// Run a version in the sandbox and print its diagnostics
    Run {
        #[command(flatten)]
        target: Target,

        /// Sandbox program [env: ARTIFACT_SANDBOX_CMD]
        #[arg(long)]
        sandbox_cmd: Option<String>,

        /// Argument for the sandbox program (repeatable)
        #[arg(long = "sandbox-arg", allow_hyphen_values = true)]
        sandbox_args: Vec<String>,

        /// Use the in-process stub sandbox
        #[arg(long, conflicts_with = "sandbox_cmd")]
        stub: bool,

        /// Publish a failed run on the bus and print the event
        #[arg(long)]
        send_back: bool,
    },
    /// Write a version's code to a directory
    Export {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        out: PathBuf,
    },
    /// Act as a sandbox: answer line-delimited JSON requests on stdio
    ServeStub {
        /// Answer `init` with false this many times first
        #[arg(long, default_value_t = 0)]
        ready_after: u32,

        /// Fail every run with this message
        #[arg(long)]
        error: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output (and the protocol,
    // for serve-stub).
    let subscriber = fmt()
        .with_env_filter(EnvFilter::from_env("ARTIFACT_LOG"))
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Command::List { store, store_id } => commands::list(&store, store_id.as_deref()),
        Command::Show(target) => commands::show(cli.config.as_deref(), &target),
        Command::Run {
            target,
            sandbox_cmd,
            sandbox_args,
            stub,
            send_back,
        } => {
            let sandbox = commands::SandboxChoice {
                command: sandbox_cmd,
                args: sandbox_args,
                stub,
            };
            commands::run(cli.config.as_deref(), &target, sandbox, send_back).await
        }
        Command::Export { target, out } => commands::export(cli.config.as_deref(), &target, &out),
        Command::ServeStub { ready_after, error } => stub::serve(ready_after, error).await,
    }
}
