use clap::{Parser, Subcommand};
use colored::*;

use codingcat_cli::commands::{migrate, run_task, RunSummary};
use codingcat_cli::{init_tracing, run_server, Config};
use codingcat_storage::RunStatus;

#[derive(Parser)]
#[command(name = "codingcat")]
#[command(about = "CodingCat - an AI agent that builds apps inside cloud sandboxes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server and run dispatcher
    Serve {
        /// API server port (overrides CODINGCAT_API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single task in the foreground and print the result
    Run {
        /// Existing project to add the task to; a new project is created when omitted
        #[arg(long)]
        project: Option<String>,
        /// What the agent should build
        task: String,
    },
    /// Create the database and apply migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            run_server(config).await?;
        }
        Commands::Run { project, task } => {
            let summary = run_task(&config, project, &task).await?;
            print_summary(&summary);
        }
        Commands::Migrate => {
            migrate(&config).await?;
            println!("{} Database is up to date", "✓".green());
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let status = match summary.run.status {
        RunStatus::Completed => summary.run.status.to_string().green(),
        RunStatus::Failed => summary.run.status.to_string().red(),
        _ => summary.run.status.to_string().yellow(),
    };

    println!("{} {}", "Project:".bold(), summary.project_id);
    println!("{} {} ({})", "Run:".bold(), summary.run.id, status);
    if let Some(error) = &summary.run.error {
        println!("{} {}", "Last error:".bold(), error.red());
    }
    if let Some(content) = &summary.content {
        println!("\n{}", content);
    }
    if let Some(url) = &summary.sandbox_url {
        println!("\n{} {}", "Preview:".bold(), url.cyan());
    }
    for path in &summary.files {
        println!("  {} {}", "•".dimmed(), path);
    }
}
