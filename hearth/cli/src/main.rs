use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hearth_access::{Member, NewMember, PolicyKey, Role};
use hearth_backend::ExecutionBackend;
use hearth_commands::action::{Action, Door};
use hearth_runtime::{ActivityEvent, Hearth, HearthConfig, MountGuard};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hearth", version, about = "Household voice and door control")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "HEARTH_CONFIG")]
    config: Option<PathBuf>,
    /// Tracing filter for console output.
    #[arg(long, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs one command as the member owning `--pin`.
    Say {
        #[arg(long)]
        pin: String,
        /// Command text, e.g. "turn on kitchen lights".
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Shows the lock state of every door.
    Doors,
    /// Locks every door.
    LockAll {
        #[arg(long)]
        pin: String,
    },
    /// Unlocks every door.
    UnlockAll {
        #[arg(long)]
        pin: String,
    },
    /// Lists household members.
    Members,
    /// Registers a member.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "member")]
        role: Role,
        #[arg(long)]
        pin: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = "")]
        relation: String,
    },
    /// Flips one policy gate, e.g. `controls.doors` or `areas.kitchen.ac`.
    Toggle { member_id: String, key: PolicyKey },
    /// Shows recent activity, newest first.
    Activity {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Interactive prompt; each line is a command.
    Repl {
        #[arg(long)]
        pin: String,
    },
    /// Starts an admin session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        pin: String,
    },
    /// Ends the admin session.
    Logout,
    /// Deletes a member (admin session required).
    Remove { member_id: String },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let config = HearthConfig::from_env_or_file(cli.config.as_deref())?;
    let hearth = Hearth::start(config).await?;

    match cli.command {
        Commands::Say { pin, text } => {
            let member = sign_in(&hearth, &pin).await?;
            let outcome = hearth
                .pipeline()
                .submit_utterance(&member, &text.join(" "), &MountGuard::new())
                .await;
            println!("{}", outcome.message());
        }
        Commands::Doors => {
            let doors = hearth.backend().get_doors().await?;
            for (door, locked) in doors {
                println!("{door:<10} {}", if locked { "locked" } else { "unlocked" });
            }
        }
        Commands::LockAll { pin } => door_all(&hearth, &pin, true).await?,
        Commands::UnlockAll { pin } => door_all(&hearth, &pin, false).await?,
        Commands::Members => {
            for member in hearth.family().members().await? {
                print_member(&member);
            }
        }
        Commands::Register {
            name,
            role,
            pin,
            email,
            relation,
        } => {
            let mut member = NewMember::new(name, role, pin).relation(relation);
            member.email = email;
            let created = hearth.family().register(member).await?;
            print_member(&created);
        }
        Commands::Toggle { member_id, key } => {
            let updated = hearth.family().toggle_policy(&member_id, key).await?;
            println!("{key} = {}", updated.policies.get(key));
        }
        Commands::Activity { limit } => {
            let limit = limit.unwrap_or(hearth.config().activity.recent_limit);
            for event in hearth.activity().recent(limit) {
                print_event(&event);
            }
        }
        Commands::Repl { pin } => repl(&hearth, &pin).await?,
        Commands::Login { email, pin } => {
            let session = hearth.family().admin_login(&email, &pin).await?;
            println!("signed in as {}", session.user.name);
        }
        Commands::Logout => {
            hearth.family().admin_logout().await?;
            println!("signed out");
        }
        Commands::Remove { member_id } => {
            hearth.family().admin_delete(&member_id).await?;
            println!("removed {member_id}");
        }
    }
    Ok(())
}

async fn sign_in(hearth: &Hearth, pin: &str) -> Result<Member> {
    hearth
        .family()
        .sign_in_pin(pin)
        .await
        .context("signing in by pin")
}

async fn door_all(hearth: &Hearth, pin: &str, lock: bool) -> Result<()> {
    let member = sign_in(hearth, pin).await?;
    let outcome = hearth
        .pipeline()
        .submit_action(&member, Action::door(Door::All, lock), &MountGuard::new())
        .await;
    println!("{}", outcome.message());
    if !outcome.is_success() {
        bail!("door command did not complete");
    }
    Ok(())
}

async fn repl(hearth: &Hearth, pin: &str) -> Result<()> {
    let member = sign_in(hearth, pin).await?;
    println!("Hello {}. Type a command, 'activity', or 'exit'.", member.name);
    let guard = MountGuard::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("hearth> ");
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "activity" => {
                for event in hearth
                    .activity()
                    .recent(hearth.config().activity.recent_limit)
                {
                    print_event(&event);
                }
            }
            text => {
                let outcome = hearth
                    .pipeline()
                    .submit_utterance(&member, text, &guard)
                    .await;
                println!("{}", outcome.message());
            }
        }
    }
    guard.release();
    Ok(())
}

fn print_member(member: &Member) {
    println!(
        "{} | {} | {} | {}",
        member.id,
        member.name,
        member.role.label(),
        if member.relation.is_empty() {
            "-"
        } else {
            member.relation.as_str()
        }
    );
}

fn print_event(event: &ActivityEvent) {
    let target = event
        .door
        .as_deref()
        .map(|door| format!("door:{door}"))
        .or_else(|| event.device.as_deref().map(|device| format!("device:{device}")))
        .unwrap_or_default();
    println!(
        "{} | {} | {} | {} | {}",
        event.ts.format("%Y-%m-%d %H:%M:%S"),
        event.kind,
        target,
        if event.success { "ok" } else { "failed" },
        event.detail.as_deref().unwrap_or("")
    );
}
