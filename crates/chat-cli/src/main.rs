//! Terminal chat client: streams replies to stdout, Ctrl-C stops a response.

mod render;

use chat_stream::api::format_category_name;
use chat_stream::profile::split_list;
use chat_stream::{
    ChatClient, ChatContext, ClientConfig, HttpChatApi, SessionHandle, SessionOutcome,
    SessionState, StreamError, UserProfile, init_observability,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt as _, BufReader};

use crate::render::TerminalSink;

#[derive(Parser)]
#[command(name = "chat-cli")]
#[command(about = "Stream chat replies from the assistant server")]
struct Cli {
    /// Chat server base URL (defaults to CHAT_STREAM_BASE_URL or http://localhost:5000)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// User id sent with every request (defaults to CHAT_STREAM_USER_ID or a fresh id)
    #[arg(long, global = true)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat. `/new` starts a new chat, `/quit` exits.
    Chat {
        /// Continue an existing chat
        #[arg(long)]
        chat_id: Option<String>,
    },
    /// Send one message and print the streamed reply
    Send {
        #[arg(long)]
        chat_id: Option<String>,
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Manage stored chats
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },
    /// Show or update the user profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// List prompt categories, or the prompts of one category
    Prompts { category: Option<String> },
}

#[derive(Subcommand)]
enum ChatsAction {
    List,
    Rename { chat_id: String, title: String },
    Delete { chat_id: String },
    DeleteAll,
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    Set {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: String,
        /// Comma-separated
        #[arg(long)]
        goals: String,
        #[arg(long)]
        dietary_preferences: String,
        #[arg(long)]
        fitness_level: String,
        /// Comma-separated
        #[arg(long)]
        interests: String,
        #[arg(long, default_value = "professional")]
        ai_tone: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_observability();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config = config.base_url(base_url);
    }
    if let Some(user_id) = cli.user_id {
        config = config.user_id(user_id);
    }
    let user_id = config.user_id.clone();
    tracing::debug!(base_url = %config.base_url, user_id = %user_id, "chat-cli starting");

    match cli.command {
        Command::Chat { chat_id } => {
            let client = ChatClient::from_config(config)?;
            interactive(&client, context(&user_id, chat_id)).await?;
        }
        Command::Send { chat_id, message } => {
            let client = ChatClient::from_config(config)?;
            let mut ctx = context(&user_id, chat_id);
            let handle = client
                .start(&mut ctx, &message.join(" "), TerminalSink::stdio())
                .await?;
            let outcome = wait_or_interrupt(handle).await?;
            finish_line(&outcome);
            if let Some(err) = outcome.error {
                return Err(err.into());
            }
        }
        Command::Chats { action } => {
            let api = HttpChatApi::new(config)?;
            manage_chats(&api, &user_id, action).await?;
        }
        Command::Profile { action } => {
            let api = HttpChatApi::new(config)?;
            manage_profile(&api, &user_id, action).await?;
        }
        Command::Prompts { category } => {
            let api = HttpChatApi::new(config)?;
            match category {
                Some(category) => {
                    for prompt in api.prompts(&category).await? {
                        println!("- {prompt}");
                    }
                }
                None => {
                    for category in api.prompt_categories().await? {
                        println!("{category}\t{}", format_category_name(&category));
                    }
                }
            }
        }
    }
    Ok(())
}

fn context(user_id: &str, chat_id: Option<String>) -> ChatContext {
    match chat_id {
        Some(chat_id) => ChatContext::with_chat(user_id, chat_id),
        None => ChatContext::new(user_id),
    }
}

async fn interactive(client: &ChatClient, mut ctx: ChatContext) -> Result<(), StreamError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("Type a message. /new starts a new chat, /quit exits, Ctrl-C stops a reply.");
    loop {
        eprint!("> ");
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(|e| StreamError::Config(format!("stdin: {e}")))?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/new" => {
                ctx.reset();
                eprintln!("Started a new chat.");
                continue;
            }
            message => {
                let handle = match client.start(&mut ctx, message, TerminalSink::stdio()).await {
                    Ok(handle) => handle,
                    // Already shown as a retry prompt.
                    Err(StreamError::Network { .. } | StreamError::Protocol { .. }) => continue,
                    Err(err) => return Err(err),
                };
                let outcome = wait_or_interrupt(handle).await?;
                finish_line(&outcome);
            }
        }
    }
    Ok(())
}

/// Waits for the session, cancelling it on Ctrl-C.
async fn wait_or_interrupt(handle: SessionHandle) -> Result<SessionOutcome, StreamError> {
    let cancel = handle.cancel_handle();
    let wait = handle.wait();
    tokio::pin!(wait);
    loop {
        tokio::select! {
            outcome = &mut wait => return outcome,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
            }
        }
    }
}

fn finish_line(outcome: &SessionOutcome) {
    if outcome.state == SessionState::Completed && !outcome.text.is_empty() {
        println!();
    }
    if !outcome.persisted && outcome.state != SessionState::Failed {
        tracing::warn!(chat_id = %outcome.chat_id, "reply was not saved");
    }
}

async fn manage_chats(
    api: &HttpChatApi,
    user_id: &str,
    action: ChatsAction,
) -> Result<(), chat_stream::ApiError> {
    match action {
        ChatsAction::List => {
            let chats = api.list_chats(user_id).await?;
            if chats.is_empty() {
                println!("No chats yet.");
            }
            for chat in chats {
                println!(
                    "{}\t{}\t{} messages\t{}",
                    chat.id,
                    chat.title,
                    chat.message_count,
                    chat.updated_at.as_deref().unwrap_or("-")
                );
            }
        }
        ChatsAction::Rename { chat_id, title } => {
            let title = api.rename_chat(user_id, &chat_id, &title).await?;
            println!("Renamed {chat_id} to \"{title}\".");
        }
        ChatsAction::Delete { chat_id } => {
            api.delete_chat(user_id, &chat_id).await?;
            println!("Deleted {chat_id}.");
        }
        ChatsAction::DeleteAll => {
            api.delete_all_chats(user_id).await?;
            println!("Deleted all chats.");
        }
    }
    Ok(())
}

async fn manage_profile(
    api: &HttpChatApi,
    user_id: &str,
    action: ProfileAction,
) -> Result<(), chat_stream::ApiError> {
    match action {
        ProfileAction::Show => match api.get_profile(user_id).await? {
            Some(profile) => print_profile(&profile),
            None => println!("No profile saved."),
        },
        ProfileAction::Set {
            name,
            age,
            goals,
            dietary_preferences,
            fitness_level,
            interests,
            ai_tone,
        } => {
            let profile = UserProfile {
                name,
                age,
                goals: split_list(&goals),
                dietary_preferences,
                fitness_level,
                interests: split_list(&interests),
                ai_tone,
                ..UserProfile::default()
            };
            let saved = api.save_profile(user_id, &profile).await?;
            println!("Profile saved.");
            print_profile(&saved);
        }
    }
    Ok(())
}

fn print_profile(profile: &UserProfile) {
    println!("name:                {}", profile.name);
    println!("age:                 {}", profile.age);
    println!("goals:               {}", profile.goals.join(", "));
    println!("dietary preferences: {}", profile.dietary_preferences);
    println!("fitness level:       {}", profile.fitness_level);
    println!("interests:           {}", profile.interests.join(", "));
    println!("ai tone:             {}", profile.ai_tone);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_joins_message_words() {
        let cli = Cli::try_parse_from(["chat-cli", "send", "plan", "a", "meal"]).expect("parse");
        match cli.command {
            Command::Send { chat_id, message } => {
                assert_eq!(chat_id, None);
                assert_eq!(message.join(" "), "plan a meal");
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn global_overrides_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "chat-cli",
            "chats",
            "rename",
            "c1",
            "Dinner",
            "--base-url",
            "http://example.test",
        ])
        .expect("parse");
        assert_eq!(cli.base_url.as_deref(), Some("http://example.test"));
        assert!(matches!(
            cli.command,
            Command::Chats {
                action: ChatsAction::Rename { .. }
            }
        ));
    }

    #[test]
    fn send_requires_a_message() {
        assert!(Cli::try_parse_from(["chat-cli", "send"]).is_err());
    }
}
