use std::sync::Arc;

use ollachat::chat::{AttachOutcome, ChatSession, SubmitOutcome, SubmitRejected};
use ollachat::command::{Command, HELP};
use ollachat::settings::{AppSettings, SettingsStore};
use ollachat_llm::{ChatProvider, OllamaClient};
use ollachat_search::DuckDuckGoSearch;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

struct Repl {
    store: SettingsStore,
    client: Arc<OllamaClient>,
    session: ChatSession,
}

impl Repl {
    fn new(store: SettingsStore) -> Self {
        let client = Arc::new(OllamaClient::new(store.provider_config()));
        let session = ChatSession::new(client.clone(), Arc::new(DuckDuckGoSearch::default()));
        Self {
            store,
            client,
            session,
        }
    }

    /// Returns false once the user asked to leave.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Send(text) => self.send(text).await,
            Command::ListModels => self.list_models().await,
            Command::SelectModel(name) => {
                self.client.select_model(&name);
                println!("using model {}", self.client.active_model());
            }
            Command::ToggleSearch => {
                let enabled = self.session.composer_mut().toggle_search();
                println!("web search {}", if enabled { "on" } else { "off" });
            }
            Command::Image(path) | Command::Attach(path) => {
                match self.session.attach_file(&path) {
                    Some(AttachOutcome::QueuedImage) => println!(
                        "image added ({} pending)",
                        self.session.composer().images().len()
                    ),
                    Some(AttachOutcome::Appended(_)) => self.print_last(),
                    None => println!("could not use {}", path.display()),
                }
            }
            Command::Edit(position) => {
                let target = self
                    .session
                    .messages()
                    .get(position - 1)
                    .map(|message| message.id());
                match target {
                    Some(id) if self.session.begin_edit(id) => {
                        println!("editing #{position}: {}", self.session.composer().text());
                        println!("type the replacement, or /cancel");
                    }
                    _ => println!("#{position} is not one of your messages"),
                }
            }
            Command::CancelEdit => {
                self.session.cancel_edit();
                println!("edit cancelled");
            }
            Command::Clear => {
                self.session.clear();
                println!("conversation cleared");
            }
            Command::SetUrl(url) => {
                let settings = AppSettings {
                    ollama_url: url,
                    ..AppSettings::clone(&self.store.settings())
                };
                if self.save_settings(settings) {
                    self.list_models().await;
                }
            }
            Command::SetSystemPrompt(prompt) => {
                let settings = AppSettings {
                    system_prompt: prompt,
                    ..AppSettings::clone(&self.store.settings())
                };
                self.save_settings(settings);
            }
            Command::Ask(prompt) => {
                let system_prompt = self.store.settings().system_prompt.clone();
                match self.client.generate(&prompt, Some(&system_prompt)).await {
                    Ok(reply) => println!("assistant: {reply}"),
                    Err(error) => println!("assistant: Error: {error}"),
                }
            }
            Command::History => self.print_history(),
            Command::Help => println!("{HELP}"),
            Command::Quit => return false,
            Command::Invalid(reason) => println!("{reason}"),
        }

        true
    }

    async fn send(&mut self, text: String) {
        self.session.composer_mut().set_text(text);
        match self.session.submit().await {
            Ok(SubmitOutcome::Replied { .. }) => self.print_last(),
            Ok(SubmitOutcome::Edited(id)) => {
                if let Some(position) = self.session.log().position(id) {
                    println!("#{} updated", position + 1);
                }
            }
            Ok(SubmitOutcome::EditTargetMissing(_)) => {
                println!("that message is gone; nothing was changed")
            }
            Ok(SubmitOutcome::ReplyDiscarded(_)) => {}
            Err(SubmitRejected::EmptyInput) => {}
            Err(rejected) => println!("{rejected}"),
        }
    }

    async fn list_models(&self) {
        if let Err(error) = self.client.list_models().await {
            println!("{error}");
            return;
        }

        let catalog = self.client.catalog();
        if catalog.models.is_empty() {
            println!("no models installed");
            return;
        }
        let active = catalog.active_model();
        for model in &catalog.models {
            let marker = if model.name == active { "*" } else { " " };
            println!("{marker} {} ({} bytes)", model.name, model.size);
        }
    }

    fn save_settings(&self, settings: AppSettings) -> bool {
        match self.store.update(settings) {
            Ok(()) => {
                let saved = self.store.settings();
                println!("server {}", saved.ollama_url);
                println!("system prompt: {}", saved.system_prompt);
                true
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to save settings");
                println!("settings not saved: {error}");
                false
            }
        }
    }

    fn print_last(&self) {
        if let Some(message) = self.session.log().last() {
            println!("{}: {}", message.role().as_str(), message.content());
        }
    }

    fn print_history(&self) {
        for (index, message) in self.session.messages().iter().enumerate() {
            let mut line = format!(
                "#{} {}: {}",
                index + 1,
                message.role().as_str(),
                message.content()
            );
            if !message.images().is_empty() {
                line.push_str(&format!(" [{} image(s)]", message.images().len()));
            }
            if message.is_edited() {
                line.push_str(" (edited)");
            }
            println!("{line}");
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = SettingsStore::load();
    tracing::info!(path = ?store.config_path(), "settings loaded");

    let mut repl = Repl::new(store);
    repl.list_models().await;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(error = %error, "failed to read input");
                break;
            }
        };

        if !repl.handle(Command::parse(&line)).await {
            break;
        }
    }
}
