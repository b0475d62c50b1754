//! Warrant CLI - a thin transport over the approval gateway.
//!
//! Every subcommand boots the kernel from configuration, runs one operation
//! and prints its result as JSON on stdout. Failures print
//! `error (<status>): <message>` on stderr and exit non-zero.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use warrant_approval::ActionError;
use warrant_config::Config;
use warrant_kernel::Kernel;
use warrant_telemetry::{CommandContext, CommandGuard};

mod commands;
mod theme;

use commands::{actions, audit, keys, plan};
use theme::Theme;

/// Warrant - propose, approve and execute agent tool calls
#[derive(Parser)]
#[command(name = "warrant")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (replaces the per-user file)
    #[arg(long, global = true, env = "WARRANT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format override: pretty, compact, json or full
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose a tool call
    Propose {
        /// Registered tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
        /// Who is asking (a public key hex in signed mode)
        #[arg(long, env = "WARRANT_REQUESTER", default_value = "agent")]
        requester: String,
    },

    /// Approve a proposed action
    Approve {
        /// Action id
        id: String,
        /// Signed approval event (JSON file)
        #[arg(long)]
        approval: Option<PathBuf>,
        /// Signed final artifact (JSON file)
        #[arg(long = "final", requires = "approval")]
        final_artifact: Option<PathBuf>,
    },

    /// Execute an action
    Execute {
        /// Action id
        id: String,
    },

    /// Show an action with its preview, approval and audit trail
    Show {
        /// Action id
        id: String,
    },

    /// Print the audit log
    Audit {
        /// Limit to one action
        id: Option<String>,
        /// Also verify the hash chain
        #[arg(long)]
        verify: bool,
    },

    /// Turn a goal into proposed actions
    Plan {
        /// What the agent should do
        goal: String,
        /// Who is asking
        #[arg(long, env = "WARRANT_REQUESTER", default_value = "agent")]
        requester: String,
    },

    /// List registered tools
    Tools,

    /// Create or show an Ed25519 key file
    Keygen {
        /// Key file
        #[arg(long, default_value = "warrant.key")]
        out: PathBuf,
        /// Replace an existing key
        #[arg(long)]
        force: bool,
    },

    /// Sign the approval (or final artifact) for an action
    Sign {
        /// Action id
        id: String,
        /// Key file written by `keygen`
        #[arg(long)]
        key: PathBuf,
        /// Sign the broadcast payload instead of the approval
        #[arg(long)]
        artifact: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Propose { .. } => "propose",
            Self::Approve { .. } => "approve",
            Self::Execute { .. } => "execute",
            Self::Show { .. } => "show",
            Self::Audit { .. } => "audit",
            Self::Plan { .. } => "plan",
            Self::Tools => "tools",
            Self::Keygen { .. } => "keygen",
            Self::Sign { .. } => "sign",
        }
    }

    fn action_id(&self) -> Option<&str> {
        match self {
            Self::Approve { id, .. }
            | Self::Execute { id }
            | Self::Show { id }
            | Self::Sign { id, .. } => Some(id.as_str()),
            Self::Audit { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!(
                "{}",
                Theme::error(&format!("error ({}): {err:#}", status_of(&err)))
            );
            ExitCode::FAILURE
        },
    }
}

/// Transport status for an error: the action taxonomy's code, else 500.
fn status_of(err: &anyhow::Error) -> u16 {
    err.downcast_ref::<ActionError>()
        .map_or(500, ActionError::status_code)
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        level.clone_into(&mut config.logging.level);
    }
    if let Some(format) = &cli.log_format {
        format.clone_into(&mut config.logging.format);
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    if let Err(e) = Kernel::init_logging(&config) {
        eprintln!("{}", Theme::warning(&format!("logging disabled: {e}")));
    }

    let mut context = CommandContext::new(cli.command.name());
    if let Some(id) = cli.command.action_id() {
        context = context.with_action(id);
    }
    let _guard = CommandGuard::new(context);

    if let Commands::Keygen { out, force } = &cli.command {
        return keys::keygen(out, *force);
    }

    let kernel = Kernel::build(config)?;
    let service = kernel.service();
    match cli.command {
        Commands::Propose {
            tool,
            args,
            requester,
        } => actions::propose(service, &tool, &args, &requester).await,
        Commands::Approve {
            id,
            approval,
            final_artifact,
        } => actions::approve(service, &id, approval.as_deref(), final_artifact.as_deref()).await,
        Commands::Execute { id } => actions::execute(service, &id).await,
        Commands::Show { id } => actions::show(service, &id).await,
        Commands::Audit { id, verify } => audit::audit(service, id.as_deref(), verify).await,
        Commands::Plan { goal, requester } => plan::plan(kernel.planner(), &goal, &requester).await,
        Commands::Tools => plan::tools(service.registry()),
        Commands::Sign { id, key, artifact } => keys::sign(service, &id, &key, artifact).await,
        Commands::Keygen { .. } => Ok(()),
    }
}
