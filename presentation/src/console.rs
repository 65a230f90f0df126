use application::chat_service::session_id_from_filename;
use application::ChatService;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input};
use domain::{ChatError, InferenceEngine, SessionId};
use infrastructure::json_log::JsonLog;
use shared::confirmation::ask_confirmation;
use shared::types::Result;
use std::sync::Arc;

/// Caller key the console binds its session under.
pub const CONSOLE_CALLER: &str = "console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Exit,
    Help,
    New,
    History,
    Show(String),
    Delete(String),
    Resume(String),
    Message(String),
}

impl ConsoleCommand {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            return Self::Exit;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Self::Message(input.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg) {
            ("new", _) => Self::New,
            ("history", _) => Self::History,
            ("help", _) => Self::Help,
            ("show", target) if !target.is_empty() => Self::Show(transcript_name(target)),
            ("delete", target) if !target.is_empty() => Self::Delete(transcript_name(target)),
            ("resume", target) if !target.is_empty() => Self::Resume(transcript_name(target)),
            _ => Self::Help,
        }
    }
}

/// Accept either a bare session number or a full transcript filename.
fn transcript_name(target: &str) -> String {
    target
        .parse::<u64>()
        .ok()
        .and_then(SessionId::new)
        .map(|id| id.filename())
        .unwrap_or_else(|| target.to_string())
}

pub struct Console<E> {
    service: Arc<ChatService<E>>,
    json_log: Option<JsonLog>,
}

impl<E: InferenceEngine> Console<E> {
    pub fn new(service: Arc<ChatService<E>>, json_log: Option<JsonLog>) -> Self {
        Self { service, json_log }
    }

    pub async fn run(&self, resume: Option<SessionId>) -> Result<()> {
        let session = match resume {
            Some(id) => self.service.resume_session(CONSOLE_CALLER, &id.filename())?,
            None => self.service.create_session(CONSOLE_CALLER).await?,
        };
        println!(
            "{} {}. Type /help for commands, 'exit' to quit.",
            "Chatting in".green(),
            session.filename.bold()
        );

        loop {
            let input: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("You")
                .allow_empty(true)
                .interact_text()?;

            let command = ConsoleCommand::parse(&input);
            if command == ConsoleCommand::Exit {
                break;
            }
            if let Err(e) = self.dispatch(command).await {
                println!("{}", format!("Error: {e}").red());
            }
        }
        Ok(())
    }

    async fn dispatch(&self, command: ConsoleCommand) -> Result<()> {
        match command {
            ConsoleCommand::Exit => {}
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::New => {
                let created = self.service.create_session(CONSOLE_CALLER).await?;
                println!("{} {}", "Started".green(), created.filename.bold());
            }
            ConsoleCommand::History => {
                let histories = self.service.list_sessions()?;
                if histories.is_empty() {
                    println!("{}", "No saved chats.".yellow());
                }
                let active = self.service.active_session(CONSOLE_CALLER);
                for name in histories {
                    let marker = if SessionId::from_filename(&name) == active { "*" } else { " " };
                    println!("{marker} {name}");
                }
            }
            ConsoleCommand::Show(name) => {
                println!("{}", self.service.get_session(&name)?);
            }
            ConsoleCommand::Delete(name) => {
                session_id_from_filename(&name)?;
                if ask_confirmation(&format!("Delete {name}?"), false)? {
                    println!("{}", self.service.delete_session(&name).await?.yellow());
                    if self.service.active_session(CONSOLE_CALLER).is_none() {
                        println!("{}", "No active chat; use /new or /resume <N>.".yellow());
                    }
                } else {
                    println!("{}", "Delete cancelled.".yellow());
                }
            }
            ConsoleCommand::Resume(name) => {
                let resumed = self.service.resume_session(CONSOLE_CALLER, &name)?;
                println!("{} {}", "Resumed".green(), resumed.filename.bold());
            }
            ConsoleCommand::Message(text) => self.send(&text).await?,
        }
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<()> {
        if !text.trim().is_empty() {
            eprintln!("{}", "Thinking...".dimmed());
        }
        let reply = self.service.send_message(CONSOLE_CALLER, text, None).await?;
        println!("{} {}", "Assistant:".cyan().bold(), reply);

        if let (Some(log), Some(id)) = (&self.json_log, self.service.active_session(CONSOLE_CALLER)) {
            match self.service.turns(id).await {
                Ok(turns) => log.write(&turns)?,
                Err(ChatError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  /new            start a new chat");
    println!("  /history        list saved chats");
    println!("  /show <N>       print a saved chat");
    println!("  /resume <N>     continue a saved chat");
    println!("  /delete <N>     delete a saved chat");
    println!("  exit | quit     leave");
}
