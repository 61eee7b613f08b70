use clap::{Parser, Subcommand};
use starbase::{App, AppResult, AppSession};
use std::path::PathBuf;
use workbench::commands::{
    run_call, run_daemon_start, run_daemon_status, run_daemon_stop, run_invoke, run_procedures,
    run_providers,
};
use workbench_daemon::logging::{self, LoggingOptions};

/// Workbench CLI - typed workspace procedures, providers and a local daemon
#[derive(Parser)]
#[command(name = "wb")]
#[command(about = "Workbench CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Start workspace discovery from this directory
    #[arg(short = 'C', long = "workspace", global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Subcommand)]
enum Commands {
    /// Call a procedure directly: wb invoke <module>.<procedure> [ARGS]
    Invoke {
        /// Provider name, overriding the configured one
        #[arg(long)]
        provider: Option<String>,
        /// Procedure path, e.g. ci.pr.get
        path: String,
        /// Positional value and --flags derived from the input schema
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List procedures with their CLI usage
    Procedures {
        /// Print the descriptions as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered providers
    Providers {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Call a procedure through the running daemon
    Call {
        /// Procedure path, e.g. workspace.echo
        path: String,
        /// Input object as JSON
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Manage the workspace daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Clone, Subcommand)]
enum DaemonAction {
    /// Run the daemon in the foreground
    Start,
    /// Show whether a daemon owns the workspace
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop the running daemon
    Stop,
}

/// Application session for the Workbench CLI
#[derive(Clone)]
struct WorkbenchSession {
    command: Commands,
    start_dir: PathBuf,
}

#[async_trait::async_trait]
impl AppSession for WorkbenchSession {
    async fn execute(&mut self) -> AppResult {
        let dir = self.start_dir.as_path();
        match &self.command {
            Commands::Invoke {
                provider,
                path,
                args,
            } => run_invoke(dir, path, provider.clone(), args).await,
            Commands::Procedures { json } => run_procedures(dir, *json),
            Commands::Providers { json } => run_providers(dir, *json),
            Commands::Call { path, input } => run_call(dir, path, input.clone()).await,
            Commands::Daemon { action } => match action {
                DaemonAction::Start => run_daemon_start(dir).await,
                DaemonAction::Status { json } => run_daemon_status(dir, *json).await,
                DaemonAction::Stop => run_daemon_stop(dir).await,
            },
        }
    }
}

#[tokio::main]
async fn main() -> starbase::MainResult {
    let cli = Cli::parse();

    // The daemon sets up its own file logging once the workspace is known
    if !matches!(cli.command, Commands::Daemon { action: DaemonAction::Start }) {
        logging::init(LoggingOptions::stderr());
    }

    let start_dir = match cli.workspace {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| miette::miette!("{}", e))?,
    };
    let session = WorkbenchSession {
        command: cli.command,
        start_dir,
    };

    // starbase runs `AppSession::execute` itself; the op closure stays empty
    let exit_code = App::default()
        .run(session, |_session| async { Ok(None) })
        .await?;
    logging::flush();

    Ok(std::process::ExitCode::from(exit_code))
}
