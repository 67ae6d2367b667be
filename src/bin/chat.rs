//! Terminal front end for the Nova chat engine.
//! Run with: cargo run --bin nova-chat
//!
//! Talks to the completion endpoint in `NOVA_LLM_ENDPOINT` and the YouTube
//! endpoint in `NOVA_VIDEO_ENDPOINT` (both on the local proxy by default) and
//! keeps history in the `SQLite` file named by `NOVA_DB_PATH`.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tokio::io::{AsyncBufReadExt, BufReader};

use nova_chat::chat::{
    ChatConfig, ChatEngine, ChatEvent, ChatObserver, ConversationId, EditTarget, NoticeLevel,
    Personality, PersonalityKind, Role, SqliteStore, TracingObserver,
};
use nova_chat::llm::HttpCompletionClient;
use nova_chat::start_nova_chat::init_tracing;
use nova_chat::video::YoutubeClient;

const HELP: &str = "\
Commands:
  /new                      start a new conversation
  /list                     list saved conversations
  /switch N|ID              open conversation N from /list (or by id prefix)
  /history                  show the active conversation
  /rename NAME              rename the active conversation
  /delete [N|ID]            delete a conversation (default: active)
  /clear                    delete every conversation
  /edit N TEXT              replace your Nth message and ask again
  /search TERM              find conversations by name or content
  /export [PATH]            print or save the active conversation as Markdown
  /suggest                  suggest follow-up questions
  /personality KIND [TEXT]  assistant, developer, teacher or creative, plus custom instructions
  /limit N                  keep at most N messages per conversation
  /reset                    restore default settings
  /quit                     leave";

/// Prints what the user needs to see; everything else goes to the log.
struct ConsoleObserver;

impl ChatObserver for ConsoleObserver {
    fn notify(&self, event: &ChatEvent) {
        match event {
            ChatEvent::Notice { level, text } => {
                let tag = match level {
                    NoticeLevel::Info => "info",
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Warning => "warning",
                    NoticeLevel::Error => "error",
                };
                eprintln!("[{tag}] {text}");
            }
            ChatEvent::ConversationOpened { name, pending, .. } => {
                let marker = if *pending { " (new)" } else { "" };
                println!("== {name}{marker} ==");
            }
            ChatEvent::ConversationRenamed { name, .. } => println!("== renamed to {name} =="),
            ChatEvent::TypingChanged { active: true } => eprintln!("Aziona is typing..."),
            other => TracingObserver.notify(other),
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warn");

    let config = ChatConfig::from_env();
    config.validate().context("invalid configuration")?;
    let store = Arc::new(SqliteStore::open(&config.storage).context("failed to open the store")?);
    let client = HttpCompletionClient::new(&config.llm)?;
    let youtube = YoutubeClient::new(&config.video)?;
    tracing::info!(
        "Completions via {}, YouTube via {}",
        client.endpoint(),
        youtube.endpoint()
    );
    let mut engine = ChatEngine::open(config, store, Arc::new(ConsoleObserver))?;

    print_history(&engine);
    println!("Type a message, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match handle(&mut engine, &client, &youtube, line).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(err) => eprintln!("error: {err:#}"),
        }
    }
    Ok(())
}

async fn handle(
    engine: &mut ChatEngine,
    client: &HttpCompletionClient,
    youtube: &YoutubeClient,
    line: &str,
) -> Result<Flow> {
    let Some(command) = line.strip_prefix('/') else {
        let reply = engine.send_with_videos(client, youtube, line).await?;
        println!("\nAziona: {}\n", reply.content);
        return Ok(Flow::Continue);
    };

    let (name, rest) = command
        .split_once(' ')
        .map_or((command, ""), |(name, rest)| (name, rest.trim()));

    match name {
        "quit" | "exit" => return Ok(Flow::Quit),
        "help" => println!("{HELP}"),
        "new" => {
            engine.new_conversation();
        }
        "list" => list(engine),
        "history" => print_history(engine),
        "switch" => {
            let id = resolve(engine, rest)?;
            engine.activate(&id)?;
            print_history(engine);
        }
        "rename" => {
            let id = active(engine)?;
            engine.rename(&id, rest)?;
        }
        "delete" => {
            let id = if rest.is_empty() {
                active(engine)?
            } else {
                resolve(engine, rest)?
            };
            if !engine.delete(&id)? {
                bail!("no conversation {id}");
            }
        }
        "clear" => engine.clear_all()?,
        "edit" => {
            let (ordinal, text) = rest.split_once(' ').context("usage: /edit N TEXT")?;
            let ordinal: usize = ordinal.parse().context("N must be a number")?;
            let target = EditTarget::UserOrdinal(ordinal.checked_sub(1).context("N starts at 1")?);
            match engine.edit_and_resend(client, target, text).await? {
                Some(reply) => println!("\nAziona: {}\n", reply.content),
                None => println!("Nothing to resend."),
            }
        }
        "search" => {
            let hits = engine.search(rest);
            if hits.is_empty() {
                println!("No matches.");
            }
            for conversation in hits {
                println!("  {}  {}", conversation.id.short(), conversation.name);
            }
        }
        "export" => {
            let id = active(engine)?;
            let markdown = engine.export_markdown(&id)?;
            if rest.is_empty() {
                println!("{markdown}");
            } else {
                std::fs::write(rest, markdown).with_context(|| format!("failed to write {rest}"))?;
                println!("Exported to {rest}");
            }
        }
        "suggest" => {
            for suggestion in engine.suggestions(client).await {
                println!("  - {suggestion}");
            }
        }
        "personality" => {
            let (kind, instructions) = rest.split_once(' ').unwrap_or((rest, ""));
            let kind: PersonalityKind = kind
                .parse()
                .map_err(|k| anyhow!("unknown personality {k:?}"))?;
            engine.update_personality(Personality {
                kind,
                custom_instructions: instructions.trim().to_string(),
            })?;
        }
        "limit" => {
            let mut settings = engine.settings().clone();
            settings.message_limit = rest.parse().context("usage: /limit N")?;
            engine.update_settings(settings)?;
        }
        "reset" => engine.reset_settings()?,
        other => bail!("unknown command /{other}; try /help"),
    }
    Ok(Flow::Continue)
}

fn active(engine: &ChatEngine) -> Result<ConversationId> {
    engine
        .current_id()
        .cloned()
        .context("no active conversation")
}

/// `N` is a 1-based position in `/list`; anything else is an id prefix.
fn resolve(engine: &ChatEngine, arg: &str) -> Result<ConversationId> {
    let conversations = engine.conversations();
    if let Ok(position) = arg.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|idx| conversations.get(idx))
            .map(|c| c.id.clone())
            .with_context(|| format!("no conversation #{position}"));
    }
    let mut matches = conversations
        .iter()
        .filter(|c| !arg.is_empty() && c.id.as_str().starts_with(arg));
    match (matches.next(), matches.next()) {
        (Some(conversation), None) => Ok(conversation.id.clone()),
        (Some(_), Some(_)) => bail!("id prefix {arg:?} is ambiguous"),
        (None, _) => bail!("no conversation matches {arg:?}"),
    }
}

fn list(engine: &ChatEngine) {
    let current = engine.current_id();
    if engine.conversations().is_empty() {
        println!("No saved conversations.");
    }
    for (idx, conversation) in engine.conversations().iter().enumerate() {
        let marker = if Some(&conversation.id) == current { "*" } else { " " };
        println!(
            "{marker}{:>3}. {}  ({} messages)  {}",
            idx + 1,
            conversation.name,
            conversation.messages.len(),
            conversation.preview(40)
        );
    }
}

fn print_history(engine: &ChatEngine) {
    let Some(conversation) = engine.current_conversation() else {
        return;
    };
    if engine.is_pending() {
        println!("(not saved until you send a message)");
    }
    for message in &conversation.messages {
        let author = match message.role {
            Role::User => "You",
            Role::Assistant => "Aziona",
            Role::System => "System",
        };
        println!("{author}: {}", message.content);
    }
}
