use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio_util::sync::CancellationToken;
use volley_core::aggregate::ResponseObserver;
use volley_core::config::{EngineKind, VolleyConfig};
use volley_core::conversation::{ImageRef, Role};
use volley_execution::{ChatOutcome, ChatSession};
use volley_interaction::read_image;

use super::{EngineArgs, build_engine};

const COMMANDS: [&str; 5] = ["/image", "/clear-image", "/reset", "/history", "/help"];

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Token limit per reply [default: 1024]
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature [default: 0.2]
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Endpoint to chat through; `completions` replays the transcript as one prompt
    #[arg(long, default_value_t = EngineKind::Chat)]
    pub engine: EngineKind,

    #[command(flatten)]
    pub connection: EngineArgs,
}

/// Rustyline helper: slash-command completion, hints and highlighting.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }

        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        self.commands
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Validator for CliHelper {}

/// Prints each newly streamed suffix as it arrives.
#[derive(Default)]
struct TerminalRenderer {
    printed: usize,
}

impl ResponseObserver for TerminalRenderer {
    fn on_update(&mut self, accumulated: &str) {
        if let Some(fresh) = accumulated.get(self.printed..) {
            print!("{}", fresh.bright_blue());
            let _ = io::stdout().flush();
        }
        self.printed = accumulated.len();
    }
}

/// One parsed line of REPL input.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Quit,
    Image(&'a str),
    ClearImage,
    Reset,
    History,
    Help,
    Unknown(&'a str),
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed == "quit" || trimmed == "exit" {
        return Input::Quit;
    }
    if !trimmed.starts_with('/') {
        return Input::Message(trimmed);
    }

    let (command, rest) = trimmed
        .split_once(char::is_whitespace)
        .map(|(c, r)| (c, r.trim()))
        .unwrap_or((trimmed, ""));
    match command {
        "/image" => Input::Image(rest),
        "/clear-image" => Input::ClearImage,
        "/reset" => Input::Reset,
        "/history" => Input::History,
        "/help" => Input::Help,
        other => Input::Unknown(other),
    }
}

fn print_help() {
    println!("{}", "Commands:".bright_black());
    for (command, description) in [
        ("/image <path|url>", "attach an image to the next message"),
        ("/clear-image", "drop the staged image"),
        ("/reset", "start a new conversation"),
        ("/history", "show the conversation so far"),
        ("quit, exit", "leave the chat"),
    ] {
        println!("  {} {}", format!("{command:<18}").bright_cyan(), description.bright_black());
    }
    println!("{}", "Ctrl-C while a reply streams cancels it.".bright_black());
}

fn print_history(session: &ChatSession) {
    if session.turns().is_empty() {
        println!("{}", "(no messages yet)".bright_black());
        return;
    }
    for turn in session.turns() {
        let label = match turn.role {
            Role::User => "user".green().bold(),
            Role::Assistant => "assistant".bright_blue().bold(),
        };
        println!("{label}: {}", turn.text);
        if let Some(image) = &turn.attachment {
            println!("  {}", format!("[image: {}]", image.label()).bright_black());
        }
    }
    if let Some(image) = session.pending_attachment() {
        println!("{}", format!("(staged image: {})", image.label()).yellow());
    }
}

/// Streams one reply, cancelling it on Ctrl-C.
async fn exchange(session: &mut ChatSession, text: &str) {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut renderer = TerminalRenderer::default();
    let outcome = session.send(text, &mut renderer, &cancel).await;
    watcher.abort();

    match outcome {
        Ok(ChatOutcome::Completed(_)) => println!(),
        Ok(ChatOutcome::Failed { error, .. }) => {
            if renderer.printed > 0 {
                println!();
            }
            println!("{}", format!("[Error: {error}]").red());
        }
        Ok(ChatOutcome::Cancelled) => println!("{}", " (cancelled)".yellow()),
        Err(err) => println!("{}", err.to_string().red()),
    }
}

pub async fn run(args: ChatArgs, mut config: VolleyConfig) -> Result<()> {
    args.connection.apply(&mut config);
    if let Some(max_tokens) = args.max_tokens {
        config.sampling.max_tokens = max_tokens;
    }
    if let Some(temperature) = args.temperature {
        config.sampling.temperature = temperature;
    }
    config.validate()?;

    let engine = build_engine(&config, args.engine)?;
    let mut session = ChatSession::new(engine, Arc::new(config.sampling));

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    println!("{}", "=== Volley chat ===".bright_magenta().bold());
    println!(
        "{}",
        format!("{} via {}", config.engine.model, config.engine.base_url).bright_black()
    );
    println!(
        "{}",
        "Type a message, '/help' for commands, or 'quit' to exit.".bright_black()
    );
    println!();

    loop {
        let prompt = if session.pending_attachment().is_some() {
            "[img] >> "
        } else {
            ">> "
        };

        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {err:?}").red());
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        match parse_input(&line) {
            Input::Quit => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
            Input::Image("") => println!("{}", "Usage: /image <path|url>".yellow()),
            Input::Image(target) => {
                let image = match ImageRef::parse(target) {
                    // Read now, like an upload, so the file may change afterwards.
                    ImageRef::Local { path } => match read_image(&path).await {
                        Ok(image) => image,
                        Err(err) => {
                            println!("{}", err.to_string().red());
                            continue;
                        }
                    },
                    remote => remote,
                };
                match session.stage_attachment(image) {
                    Ok(()) => println!("{}", format!("Image staged: {target}").green()),
                    Err(err) => println!("{}", err.to_string().red()),
                }
            }
            Input::ClearImage => match session.clear_attachment() {
                Ok(()) => println!("{}", "Staged image cleared.".green()),
                Err(err) => println!("{}", err.to_string().red()),
            },
            Input::Reset => {
                session.reset();
                println!("{}", "Conversation reset.".green());
            }
            Input::History => print_history(&session),
            Input::Help => print_help(),
            Input::Unknown(command) => {
                println!("{}", format!("Unknown command: {command}").bright_black())
            }
            Input::Message(text) => exchange(&mut session, text).await,
        }
    }

    Ok(())
}
