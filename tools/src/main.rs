//! tinypg-host: stands in for the game server and drives the plugin core.
//!
//! Usage:
//!   tinypg-host --db players.db join 069a79f4-... Steve
//!   tinypg-host --config storage.json top --limit 5
//!   tinypg-host --db players.db ipc < events.jsonl

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tinypg_core::{
    messages::strip_colors, types::DEFAULT_LEADERBOARD_SIZE, PlayerRecord, PluginContext,
    StorageConfig, StorageSettings,
};

#[derive(Parser)]
#[command(name = "tinypg-host", version, about = "Drive the Tiny PG plugin core from a shell")]
struct Cli {
    /// JSON file with storage settings (storageKind, path, host, ...).
    #[arg(long, conflicts_with = "db")]
    config: Option<PathBuf>,

    /// Embedded SQLite file to use instead of a settings file.
    #[arg(long, default_value = "tinypg.db")]
    db: String,

    /// Print chat lines with their colour codes intact.
    #[arg(long)]
    raw: bool,

    #[command(subcommand)]
    command: HostCommand,
}

#[derive(Subcommand)]
enum HostCommand {
    /// A player connects.
    Join { id: String, name: String },
    /// A player disconnects after `minutes` online.
    Quit {
        id: String,
        name: String,
        #[arg(long, default_value_t = 0)]
        minutes: i64,
    },
    /// Run `/hello`.
    Hello,
    /// Show the balance leaderboard.
    Top {
        #[arg(long, default_value_t = DEFAULT_LEADERBOARD_SIZE)]
        limit: i64,
    },
    /// Print one player record as JSON.
    Show { id: String },
    /// Adjust play time (negative values correct it, clamped at 0).
    AddPlaytime {
        id: String,
        #[arg(allow_hyphen_values = true)]
        minutes: i64,
    },
    /// Adjust balance (may go negative).
    AddBalance {
        id: String,
        #[arg(allow_hyphen_values = true)]
        amount: f64,
    },
    /// Read JSON host events from stdin, one per line.
    Ipc,
}

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostEvent {
    Join { id: String, name: String },
    Quit {
        id: String,
        name: String,
        #[serde(default)]
        minutes: i64,
    },
    Hello,
    Top {
        #[serde(default = "default_limit")]
        limit: i64,
    },
    Show { id: String },
    AddPlayTime { id: String, minutes: i64 },
    AddBalance { id: String, amount: f64 },
    Shutdown,
}

#[derive(serde::Serialize)]
struct HostReply {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chat: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    player: Option<PlayerRecord>,
}

fn default_limit() -> i64 {
    DEFAULT_LEADERBOARD_SIZE
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let ctx = match &cli.config {
        Some(path) => {
            let settings = StorageSettings::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            PluginContext::enable(&settings)?
        }
        None => PluginContext::enable_with(&StorageConfig::embedded(cli.db.clone())),
    };

    if !ctx.persistence_available() {
        log::warn!("storage unavailable; running without persistence");
    }

    let result = run(&ctx, &cli);
    ctx.disable();
    result
}

fn run(ctx: &PluginContext, cli: &Cli) -> Result<()> {
    let chat = |line: String| {
        if cli.raw {
            println!("{line}");
        } else {
            println!("{}", strip_colors(&line));
        }
    };

    match &cli.command {
        HostCommand::Join { id, name } => chat(ctx.on_player_join(id, name)),
        HostCommand::Quit { id, name, minutes } => chat(ctx.on_player_quit(id, name, *minutes)),
        HostCommand::Hello => chat(ctx.on_hello_command()),
        HostCommand::Top { limit } => ctx.on_top_command(*limit).into_iter().for_each(chat),
        HostCommand::Show { id } => match ctx.store().find_by_id(id)? {
            Some(player) => println!("{}", serde_json::to_string_pretty(&player)?),
            None => bail!("no player with id {id}"),
        },
        HostCommand::AddPlaytime { id, minutes } => {
            ctx.store().add_play_time(id, *minutes)?;
            match ctx.store().find_by_id(id)? {
                Some(p) => println!("{}: {} minutes played", p.display_name, p.play_time_minutes),
                None => bail!("no player with id {id}"),
            }
        }
        HostCommand::AddBalance { id, amount } => chat(ctx.on_pay_command(id, *amount)),
        HostCommand::Ipc => run_ipc_loop(ctx)?,
    }
    Ok(())
}

fn run_ipc_loop(ctx: &PluginContext) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(&buffer) {
            Ok(e) => e,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };

        if let HostEvent::Shutdown = event {
            break;
        }
        let reply = handle_event(ctx, event);
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_event(ctx: &PluginContext, event: HostEvent) -> HostReply {
    let chat_only = |chat: Vec<String>| HostReply { chat, player: None };
    match event {
        HostEvent::Join { id, name } => chat_only(vec![ctx.on_player_join(&id, &name)]),
        HostEvent::Quit { id, name, minutes } => {
            chat_only(vec![ctx.on_player_quit(&id, &name, minutes)])
        }
        HostEvent::Hello => chat_only(vec![ctx.on_hello_command()]),
        HostEvent::Top { limit } => chat_only(ctx.on_top_command(limit)),
        HostEvent::Show { id } => lookup(ctx, &id),
        HostEvent::AddPlayTime { id, minutes } => {
            if let Err(e) = ctx.store().add_play_time(&id, minutes) {
                return chat_only(vec![ctx.messages().error(&e.to_string())]);
            }
            lookup(ctx, &id)
        }
        HostEvent::AddBalance { id, amount } => chat_only(vec![ctx.on_pay_command(&id, amount)]),
        HostEvent::Shutdown => chat_only(Vec::new()),
    }
}

fn lookup(ctx: &PluginContext, id: &str) -> HostReply {
    match ctx.store().find_by_id(id) {
        Ok(player @ Some(_)) => HostReply { chat: Vec::new(), player },
        Ok(None) => HostReply {
            chat: vec![ctx.messages().error("Unknown player.")],
            player: None,
        },
        Err(e) => HostReply {
            chat: vec![ctx.messages().error(&e.to_string())],
            player: None,
        },
    }
}
