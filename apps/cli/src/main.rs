use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use output::{OutputFormat, Renderer};
use progress::spinner;
use repl::ReplCommand;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};
use upkeep_chat_client::GenerativeClient;
use upkeep_chat_core::ChatSession;

/// Shown in the REPL when a turn fails, matching the widget this tool grew
/// out of. Details go to the log, not the user.
const SEND_FAILURE_MESSAGE: &str = "The message could not be sent. Please try again.";

#[derive(Debug, Parser, Clone)]
#[command(
    name = "upkeep-chat",
    version,
    about = "Chat with a home-maintenance assistant from the shell."
)]
struct Cli {
    /// Preferred renderer for model replies.
    #[arg(long, global = true, value_enum, default_value = "html")]
    format: OutputFormat,
    /// Path to a settings file (defaults to `upkeep-chat.toml` if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the model identifier.
    #[arg(long, global = true)]
    model: Option<String>,
    /// Override the API base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Disable ANSI colors in CLI output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Suppress non-critical CLI output.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable the progress indicator while a request is in flight.
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Start an interactive chat session (the default).
    Chat,
    /// Send a single message and print the reply.
    Ask {
        /// The message to send; multiple words are joined with spaces.
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if cli.no_color {
        std::env::set_var("NO_COLOR", "1");
    }

    match cli.command.clone().unwrap_or(Command::Chat) {
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "upkeep-chat", &mut std::io::stdout());
            Ok(())
        }
        Command::Chat => {
            let (renderer, mut session) = build_session(&cli)?;
            run_chat(&cli, &renderer, &mut session).await
        }
        Command::Ask { message } => {
            let (renderer, mut session) = build_session(&cli)?;
            let message = message.join(" ");
            let indicator = spinner(cli.progress_enabled(), "Waiting for the assistant...");
            let result = session.send(&message).await;
            finish_spinner(indicator);
            let reply = result.context("chat request failed")?;
            renderer.reply(&reply);
            Ok(())
        }
    }
}

fn build_session(cli: &Cli) -> Result<(Renderer, ChatSession)> {
    let settings = settings::load(cli.config.as_deref())?;
    let client = GenerativeClient::with_config(settings.client_config(cli));
    Ok((Renderer::new(cli.format), ChatSession::new(client)))
}

async fn run_chat(cli: &Cli, renderer: &Renderer, session: &mut ChatSession) -> Result<()> {
    if !cli.quiet {
        renderer.banner(session.model());
    }

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut buffer = String::new();

    loop {
        renderer.prompt()?;
        buffer.clear();
        let bytes = reader.read_line(&mut buffer).await?;
        if bytes == 0 {
            break;
        }

        let input = buffer.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = repl::parse_command(input) {
            match command {
                ReplCommand::Quit => break,
                ReplCommand::Help => renderer.help(),
                ReplCommand::History => renderer.history(session.history()),
                ReplCommand::Save(path) => {
                    match transcript::save(path, session.model(), session.history()).await {
                        Ok(saved) => renderer.saved(&saved),
                        Err(error) => {
                            warn!(target: "upkeep_chat_cli", error = %error, "failed to save transcript");
                            renderer.line(&format!("Could not save transcript: {error}"));
                        }
                    }
                }
                ReplCommand::Unknown(name) => {
                    renderer.line(&format!("Unknown command `/{name}`; try /help."));
                }
            }
            continue;
        }

        let indicator = spinner(cli.progress_enabled(), "Waiting for the assistant...");
        let result = session.send(input).await;
        finish_spinner(indicator);
        match result {
            Ok(reply) => renderer.reply(&reply),
            Err(error) => {
                warn!(target: "upkeep_chat_cli", error = %error, "chat turn failed");
                renderer.line(SEND_FAILURE_MESSAGE);
            }
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,upkeep_chat_cli=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<indicatif::ProgressBar>) {
    if let Some(progress) = spinner {
        progress.finish_and_clear();
    }
}

mod repl {
    use std::path::PathBuf;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ReplCommand {
        Help,
        History,
        Save(Option<PathBuf>),
        Quit,
        Unknown(String),
    }

    /// Returns `None` for ordinary chat input; only lines starting with `/`
    /// are commands.
    pub fn parse_command(input: &str) -> Option<ReplCommand> {
        let rest = input.strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();
        let command = match name {
            "help" => ReplCommand::Help,
            "history" => ReplCommand::History,
            "save" => ReplCommand::Save(words.next().map(PathBuf::from)),
            "quit" | "exit" => ReplCommand::Quit,
            other => ReplCommand::Unknown(other.to_string()),
        };
        Some(command)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn chat_input_is_not_a_command() {
            assert_eq!(parse_command("fix my faucet"), None);
        }

        #[test]
        fn save_takes_an_optional_path() {
            assert_eq!(parse_command("/save"), Some(ReplCommand::Save(None)));
            assert_eq!(
                parse_command("/save notes.json"),
                Some(ReplCommand::Save(Some(PathBuf::from("notes.json"))))
            );
        }

        #[test]
        fn quit_has_an_exit_alias() {
            assert_eq!(parse_command("/quit"), Some(ReplCommand::Quit));
            assert_eq!(parse_command("/exit"), Some(ReplCommand::Quit));
        }

        #[test]
        fn unknown_commands_are_reported_by_name() {
            assert_eq!(
                parse_command("/frobnicate now"),
                Some(ReplCommand::Unknown("frobnicate".to_string()))
            );
        }
    }
}

mod output {
    use std::io::Write;

    use anyhow::Result;
    use clap::ValueEnum;
    use upkeep_chat_client::{Role, Turn};
    use upkeep_chat_core::html;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
    pub enum OutputFormat {
        /// Run replies through the HTML formatter.
        Html,
        /// Print replies exactly as the model sent them.
        Text,
    }

    #[derive(Copy, Clone, Debug)]
    pub struct Renderer {
        format: OutputFormat,
    }

    impl Renderer {
        pub fn new(format: OutputFormat) -> Self {
            Self { format }
        }

        pub fn banner(&self, model: &str) {
            println!("Chatting with `{model}`. Type /help for commands, /quit to leave.");
        }

        pub fn prompt(&self) -> Result<()> {
            let mut stdout = std::io::stdout();
            write!(stdout, "you> ")?;
            stdout.flush()?;
            Ok(())
        }

        pub fn reply(&self, text: &str) {
            match self.format {
                OutputFormat::Html => println!("{}", html::format(text)),
                OutputFormat::Text => println!("{text}"),
            }
        }

        pub fn line(&self, text: &str) {
            println!("{text}");
        }

        pub fn help(&self) {
            println!("/help            show this message");
            println!("/history         print the conversation so far");
            println!("/save [path]     write the transcript to a JSON file");
            println!("/quit            leave the chat");
        }

        pub fn history(&self, turns: &[Turn]) {
            if turns.is_empty() {
                println!("(no messages yet)");
                return;
            }
            for turn in turns {
                let speaker = match turn.role {
                    Role::User => "you",
                    Role::Model => "assistant",
                };
                println!("{speaker}: {}", turn.text());
            }
        }

        pub fn saved(&self, path: &std::path::Path) {
            println!("Transcript saved to {}.", path.display());
        }
    }
}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    pub fn spinner(enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(80));
        Some(progress)
    }
}

mod settings {
    use std::path::Path;

    use anyhow::{Context, Result};
    use serde::Deserialize;
    use upkeep_chat_client::ClientConfig;

    use crate::Cli;

    /// Optional file/environment settings layered over the client defaults.
    /// Environment variables use the `UPKEEP_CHAT_` prefix; the API key also
    /// falls back to `GEMINI_API_KEY` via [`ClientConfig::default`].
    #[derive(Debug, Default, Clone, Deserialize)]
    #[serde(default)]
    pub struct Settings {
        pub api_key: Option<String>,
        pub model: Option<String>,
        pub base_url: Option<String>,
        pub timeout_secs: Option<u64>,
    }

    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path.to_path_buf())),
            None => builder.add_source(config::File::with_name("upkeep-chat").required(false)),
        };
        builder = builder.add_source(config::Environment::with_prefix("UPKEEP_CHAT"));
        let settings = builder
            .build()
            .context("failed to load settings")?
            .try_deserialize()
            .context("invalid settings")?;
        Ok(settings)
    }

    impl Settings {
        /// Merge defaults, file/env settings, and command-line overrides, in
        /// that order of increasing precedence.
        pub fn client_config(&self, cli: &Cli) -> ClientConfig {
            let mut config = ClientConfig::default();
            if let Some(api_key) = &self.api_key {
                config.api_key = api_key.clone();
            }
            if let Some(model) = &self.model {
                config.model = model.clone();
            }
            if let Some(base_url) = &self.base_url {
                config.base_url = base_url.clone();
            }
            if let Some(secs) = self.timeout_secs {
                config.timeout = std::time::Duration::from_secs(secs);
            }
            if let Some(model) = &cli.model {
                config.model = model.clone();
            }
            if let Some(base_url) = &cli.base_url {
                config.base_url = base_url.clone();
            }
            config
        }
    }

}

mod transcript {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use serde::Serialize;
    use time::OffsetDateTime;
    use tokio::io::AsyncWriteExt;
    use upkeep_chat_client::Turn;

    #[derive(Debug, Serialize)]
    struct TranscriptRecord<'a> {
        schema_version: u32,
        #[serde(with = "time::serde::rfc3339")]
        saved_at: OffsetDateTime,
        model: &'a str,
        turns: &'a [Turn],
    }

    /// Write the conversation to a JSON file, atomically (temp file then
    /// rename). With no explicit path a timestamped name in the current
    /// directory is used.
    pub async fn save(path: Option<PathBuf>, model: &str, turns: &[Turn]) -> Result<PathBuf> {
        let now = OffsetDateTime::now_utc();
        let final_path = path
            .unwrap_or_else(|| PathBuf::from(format!("transcript_{}.json", now.unix_timestamp())));

        let record = TranscriptRecord {
            schema_version: 1,
            saved_at: now,
            model,
            turns,
        };
        let bytes = serde_json::to_vec_pretty(&record).context("serialize transcript")?;

        let tmp_path = tmp_sibling(&final_path);
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("create temp transcript file {}", tmp_path.display()))?;
        file.write_all(&bytes).await.context("write transcript")?;
        file.write_all(b"\n").await.context("write newline")?;
        file.flush().await.context("flush transcript")?;
        drop(file);

        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .with_context(|| format!("rename {} -> {}", tmp_path.display(), final_path.display()))?;

        Ok(final_path)
    }

    fn tmp_sibling(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcript.json".to_string());
        path.with_file_name(format!(".{name}.tmp"))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use tempfile::tempdir;

        #[tokio::test]
        async fn writes_a_parseable_transcript() {
            let dir = tempdir().expect("tempdir");
            let path = dir.path().join("chat.json");
            let turns = vec![Turn::user("hello"), Turn::model("**Hi:**\n- welcome")];

            let saved = save(Some(path.clone()), "gemini-1.5-pro", &turns)
                .await
                .expect("save");
            assert_eq!(saved, path);

            let bytes = tokio::fs::read(&saved).await.expect("read");
            let parsed: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
            assert_eq!(parsed["schema_version"], 1);
            assert_eq!(parsed["model"], "gemini-1.5-pro");
            assert_eq!(parsed["turns"][0]["role"], "user");
            assert_eq!(parsed["turns"][1]["parts"][0]["text"], "**Hi:**\n- welcome");
        }

        #[tokio::test]
        async fn transcript_path_is_used_verbatim() {
            let dir = tempdir().expect("tempdir");
            let path = dir.path().join("nested-name with spaces.json");
            let saved = save(Some(path.clone()), "gemini-1.5-pro", &[])
                .await
                .expect("save");
            assert_eq!(saved, path);
            assert!(path.exists());
        }
    }
}
