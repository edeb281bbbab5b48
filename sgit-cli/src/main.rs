//! sgit - minimal snapshot version control.
//!
//! # Usage
//!
//! ```bash
//! sgit init
//! sgit commit "first snapshot"
//! sgit log 5
//! sgit status
//! sgit checkout 2aae6c35
//!
//! # Whole-repository sync with an sgit-server
//! sgit push http://localhost:3003 my-project
//! sgit pull http://localhost:3003 my-project
//! sgit remote status http://localhost:3003 my-project
//! sgit list-repos http://localhost:3003
//! ```

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use sgit_cli::RemoteClient;
use sgit_core::{DEFAULT_AUTHOR, DEFAULT_LOG_LIMIT, Repository, RepositoryStatus};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sgit")]
#[command(author = "SGit Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Minimal snapshot version control with HTTP sync")]
struct Cli {
    /// Working directory of the repository
    #[arg(short = 'C', long, global = true, default_value = ".")]
    repo_dir: PathBuf,

    /// Timeout for remote requests, in seconds
    #[arg(long, global = true, default_value_t = 300)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init,

    /// Record every file in the working tree
    Commit {
        /// Commit message; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
        /// Commit author
        #[arg(long, default_value = DEFAULT_AUTHOR)]
        author: String,
    },

    /// Show recent commits, newest first
    Log {
        /// Maximum number of commits
        #[arg(default_value_t = DEFAULT_LOG_LIMIT)]
        limit: usize,
    },

    /// Compare the working tree against HEAD
    Status,

    /// Restore the working tree to a commit
    Checkout {
        /// Full digest or unique prefix
        commit: String,
    },

    /// Upload the current snapshot to a server
    Push {
        /// Server URL (e.g., http://localhost:3003)
        url: String,
        /// Repository name on the server
        repo: String,
    },

    /// Replace local state with the server's snapshot
    Pull {
        /// Server URL
        url: String,
        /// Repository name on the server
        repo: String,
    },

    /// Query a remote repository
    Remote {
        #[command(subcommand)]
        action: RemoteCommands,
    },

    /// List repositories hosted by a server
    #[command(name = "list-repos")]
    ListRepos {
        /// Server URL
        url: String,
    },
}

#[derive(Subcommand, Debug)]
enum RemoteCommands {
    /// Show head, file count and last update of a remote repository
    Status {
        /// Server URL
        url: String,
        /// Repository name on the server
        repo: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let repo = Repository::open(&cli.repo_dir);
    let timeout = Duration::from_secs(cli.timeout);

    match cli.command {
        Commands::Init => {
            if repo.init()? {
                println!(
                    "Initialized empty sgit repository in {}",
                    repo.store().control_dir().display()
                );
            } else {
                println!("Repository already exists");
            }
        }

        Commands::Commit { message, author } => {
            let message = message.join(" ");
            let id = repo.commit(&message, &author)?;
            let files = repo
                .store()
                .get_commit(&id)?
                .map(|record| record.files.len())
                .unwrap_or(0);
            println!("Committed {} files", files);
            println!("Commit: {}", id.short());
        }

        Commands::Log { limit } => {
            let entries = repo.log(limit)?;
            if entries.is_empty() {
                println!("No commits found");
            }
            for entry in entries {
                println!("Commit: {}", entry.id.short());
                println!("Author: {}", entry.record.author);
                println!("Date: {}", local_time(&entry.record.timestamp));
                println!("Message: {}", entry.record.message);
                println!("Files: {}", entry.record.files.len());
                println!();
            }
        }

        Commands::Status => {
            let status = repo.status()?;
            print_status(&status);
        }

        Commands::Checkout { commit } => {
            let id = repo.resolve_commit(&commit)?;
            let summary = repo.checkout(&id)?;
            println!("Checked out commit {}", id.short());
            println!("Restored {} files", summary.restored);
            if summary.skipped > 0 {
                println!("Skipped {} files (see log for details)", summary.skipped);
            }
        }

        Commands::Push { url, repo: name } => {
            let client = RemoteClient::new(&url, timeout)?;
            println!("Preparing data for push...");
            let payload = repo.export()?;
            println!("Pushing to remote...");
            let result = client.push(&name, &payload).await?;
            println!("Push successful: {}", result.message);
        }

        Commands::Pull { url, repo: name } => {
            let client = RemoteClient::new(&url, timeout)?;
            println!("Pulling from remote...");
            let Some(payload) = client.pull(&name).await? else {
                println!("No remote repository found");
                return Ok(());
            };
            println!("Applying remote changes...");
            let id = repo.import(&payload)?;
            println!("Pull successful: {}", id.short());
        }

        Commands::Remote {
            action: RemoteCommands::Status { url, repo: name },
        } => {
            let client = RemoteClient::new(&url, timeout)?;
            match client.status(&name).await? {
                None => println!("Remote repository not found"),
                Some(status) => {
                    println!("Remote repository status for {}:", name);
                    println!("Repository: {}", status.repository);
                    println!("Commit: {}", status.commit.as_deref().unwrap_or("none"));
                    println!("Files: {}", status.files);
                    println!(
                        "Last updated: {}",
                        status.last_update.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }

        Commands::ListRepos { url } => {
            let client = RemoteClient::new(&url, timeout)?;
            println!("Fetching repository list...");
            let list = client.list_repositories().await?;
            println!();
            println!("Remote repositories on {}:", url);
            if list.repositories.is_empty() {
                println!("No repositories found");
            } else {
                for (index, name) in list.repositories.iter().enumerate() {
                    println!("  {}. {}", index + 1, name);
                }
                println!();
                println!("Total: {} repositories", list.count);
            }
        }
    }

    Ok(())
}

fn print_status(status: &RepositoryStatus) {
    println!("Branch: {}", status.branch);
    println!("Commit: {}", status.commit.as_deref().unwrap_or("none"));
    println!("Files: {}", status.files);

    if let Some(target) = &status.interrupted {
        println!();
        println!(
            "Warning: checkout of {} did not finish; run `sgit checkout {}` to retry",
            target.short(),
            target
        );
    }

    let sections = [
        ("Modified", "M", &status.modified),
        ("Untracked", "?", &status.untracked),
        ("Deleted", "D", &status.deleted),
    ];
    for (title, marker, files) in sections {
        if files.is_empty() {
            continue;
        }
        println!();
        println!("{} files: {}", title, files.len());
        for file in files {
            println!("  {} {}", marker, file);
        }
    }
}

/// Render a stored RFC 3339 timestamp in local time
fn local_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}
