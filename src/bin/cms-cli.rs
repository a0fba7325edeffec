#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for synchronizing with a Converged Message Store

use anyhow::bail;
use clap::{Args as ClapArgs, Parser, Subcommand};
use cms_sync::{
    CmsConfig, DeleteTask, Folder, JsonMessageLog, PushTask, RemoteMessage, Scheduler, ShowTask,
    TaskOutput, TaskReport, connect,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cms-cli")]
#[command(about = "Synchronize message history with a Converged Message Store")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List folders with their counters
    Folders,

    /// Fetch and print every stored message
    Show,

    /// Delete folders or expunge flagged messages
    Delete(DeleteArgs),

    /// Upload pending messages from a JSON file
    Push {
        /// JSON array of pending messages
        #[arg(long)]
        pending: PathBuf,

        /// Where to write the id to UID map (default: <pending>.uids.json)
        #[arg(long)]
        uids: Option<PathBuf>,
    },
}

#[derive(ClapArgs)]
#[group(required = true, multiple = false)]
struct DeleteArgs {
    /// Delete every folder except INBOX
    #[arg(long)]
    all: bool,

    /// Delete one folder
    #[arg(long, value_name = "NAME")]
    mailbox: Option<String>,

    /// Expunge messages flagged \Deleted in a folder
    #[arg(long, value_name = "NAME")]
    expunge: Option<String>,
}

impl DeleteArgs {
    fn task(&self) -> DeleteTask {
        if let Some(name) = &self.mailbox {
            DeleteTask::mailbox(name.as_str())
        } else if let Some(name) = &self.expunge {
            DeleteTask::expunge(name.as_str())
        } else {
            DeleteTask::all_mailboxes()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = CmsConfig::from_env()?;

    match &args.command {
        Command::Folders => cmd_folders(&config, &args).await,
        Command::Show => run_task(&config, &args, ShowTask::new()).await,
        Command::Delete(delete) => run_task(&config, &args, delete.task()).await,
        Command::Push { pending, uids } => {
            let log = match uids {
                Some(uids) => JsonMessageLog::new(pending, uids),
                None => JsonMessageLog::beside(pending),
            };
            let task = PushTask::new(Arc::new(log), config.folder_prefix.as_str())
                .with_user_address(config.user_address.as_str());
            run_task(&config, &args, task).await
        }
    }
}

async fn cmd_folders(config: &CmsConfig, args: &Args) -> anyhow::Result<()> {
    let mut session = connect(config).await?;
    let folders = session.list_status().await;
    session.close().await;
    let folders = folders?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&folders)?);
    } else {
        print_folder_table(&folders);
    }
    Ok(())
}

async fn run_task(
    config: &CmsConfig,
    args: &Args,
    task: impl cms_sync::Task + 'static,
) -> anyhow::Result<()> {
    let mut scheduler = Scheduler::connect(config).await?;
    let report = scheduler.run_one(task).await;
    scheduler.into_session().close().await;
    print_report(&report, args.json)
}

fn print_report(report: &TaskReport, json: bool) -> anyhow::Result<()> {
    let output = match &report.result {
        Ok(output) => output,
        Err(failure) => bail!(
            "{} failed ({:?}): {}",
            report.task,
            failure.kind,
            failure.message
        ),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
        return Ok(());
    }

    match output {
        TaskOutput::Deleted(folders) => {
            for folder in folders {
                println!("deleted {folder}");
            }
            println!("\n{} folder(s) deleted", folders.len());
        }
        TaskOutput::Expunged(sequences) => {
            println!("{} message(s) expunged", sequences.len());
        }
        TaskOutput::Pushed(uids) => {
            let mut pairs: Vec<_> = uids.iter().collect();
            pairs.sort();
            for (id, uid) in &pairs {
                println!("{id:<20} {uid}");
            }
            println!("\n{} message(s) pushed", pairs.len());
        }
        TaskOutput::Listed(messages) => print_message_table(messages),
    }
    Ok(())
}

fn print_folder_table(folders: &[Folder]) {
    if folders.is_empty() {
        println!("No folders found.");
        return;
    }

    println!(
        "{:<40} {:>8} {:>12} {:>8} {:>14}",
        "Folder", "Messages", "UIDValidity", "UIDNext", "HighestModseq"
    );
    println!("{}", "-".repeat(86));
    for folder in folders {
        println!(
            "{:<40} {:>8} {:>12} {:>8} {:>14}",
            truncate(folder.name(), 40),
            show(folder.messages()),
            show(folder.uid_validity()),
            show(folder.uid_next()),
            show(folder.highest_modseq()),
        );
    }
    println!("\n{} folder(s)", folders.len());
}

fn print_message_table(messages: &[RemoteMessage]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }

    println!("{:<30} {:<6} {:<5} {:<24} {}", "Folder", "UID", "Seen", "From", "Content");
    println!("{}", "-".repeat(100));
    for message in messages {
        let (from, content) = message.envelope().map_or_else(
            |_| (String::from("-"), message.body.clone()),
            |envelope| {
                (
                    envelope.header("From").unwrap_or("-").to_string(),
                    envelope.body().content().to_string(),
                )
            },
        );
        println!(
            "{:<30} {:<6} {:<5} {:<24} {}",
            truncate(&message.folder, 30),
            message.uid,
            if message.is_seen() { "yes" } else { "no" },
            truncate(&from, 24),
            truncate(&content.replace("\r\n", " "), 40),
        );
    }
    println!("\n{} message(s)", messages.len());
}

fn show<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
