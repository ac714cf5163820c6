use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "permwatch",
    version,
    about = "Audit granted database permissions against a declared access policy"
)]
struct Cli {
    /// Configuration file. Relative paths inside it resolve against its directory.
    #[arg(long, global = true, default_value = "permwatch.yaml", env = "PERMWATCH_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the permission database and write the policy baseline.
    Seed {
        /// Replace existing records even if the database already holds some.
        #[arg(long, default_value_t = false)]
        reset: bool,
    },

    /// Introduce reproducible drift into the permission database.
    Inject {
        #[command(subcommand)]
        cmd: InjectCommand,
    },

    /// Audit the permission database against the access policy.
    Audit {
        /// Write the Findings JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write a Markdown report here.
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Compare with a previous Findings snapshot.
        #[arg(long)]
        previous: Option<PathBuf>,
    },

    /// Show a user's granted permissions.
    Privileges { username: String },

    /// List users who may perform an action on a table.
    WhoCan { table: String, action: String },

    /// List registered capability servers.
    Servers {
        /// Only specialist agent servers.
        #[arg(long, default_value_t = false)]
        agents: bool,
    },

    /// Call one tool on a capability server.
    Call {
        server: String,
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Plan and run a full audit through the capability servers.
    Orchestrate {
        /// Task handed to the planner.
        #[arg(long)]
        task: Option<String>,
    },

    /// Run a capability server on stdin/stdout.
    Serve {
        #[arg(value_enum)]
        server: ServeTarget,
    },
}

#[derive(Subcommand, Debug)]
enum InjectCommand {
    /// Grant an action the policy does not allow.
    Grant {
        username: String,
        table: String,
        action: String,
    },
    /// Revoke an action the policy requires.
    Revoke {
        username: String,
        table: String,
        action: String,
    },
    /// Restore the policy baseline.
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ServeTarget {
    Db,
    Fs,
    Auditor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC when serving; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Seed { reset } => commands::store::seed(&cli.config, reset).await?,

        Command::Inject { cmd } => match cmd {
            InjectCommand::Grant {
                username,
                table,
                action,
            } => commands::store::grant(&cli.config, &username, &table, &action).await?,
            InjectCommand::Revoke {
                username,
                table,
                action,
            } => commands::store::revoke(&cli.config, &username, &table, &action).await?,
            InjectCommand::Reset => commands::store::reset(&cli.config).await?,
        },

        Command::Audit {
            output,
            markdown,
            previous,
        } => {
            commands::audit::run(
                &cli.config,
                output.as_deref(),
                markdown.as_deref(),
                previous.as_deref(),
            )
            .await?
        }

        Command::Privileges { username } => {
            commands::audit::privileges(&cli.config, &username).await?
        }

        Command::WhoCan { table, action } => {
            commands::audit::who_can(&cli.config, &table, &action).await?
        }

        Command::Servers { agents } => commands::servers::list(&cli.config, agents)?,

        Command::Call { server, tool, args } => {
            commands::servers::call(&cli.config, &server, &tool, &args).await?
        }

        Command::Orchestrate { task } => {
            commands::servers::orchestrate(&cli.config, task.as_deref()).await?
        }

        Command::Serve { server } => commands::serve::run(&cli.config, server).await?,
    }

    Ok(())
}
