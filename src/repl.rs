//! Terminal chat: one session driven from stdin.
//!
//! Every line is a turn, except for two commands:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/upload <path>` | Load a PDF or text file into the session |
//! | `/quit` | End the session (EOF does the same) |

use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::dispatch::{DispatchError, Dispatcher, UploadOutcome};
use crate::ingest::content_type_for_path;
use crate::models::Turn;
use crate::session::Session;

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Upload(&'a str),
    Text(&'a str),
    Blank,
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Blank;
    }
    if trimmed == "/quit" || trimmed == "/exit" {
        return Input::Quit;
    }
    if let Some(rest) = trimmed.strip_prefix("/upload ") {
        let path = rest.trim();
        if !path.is_empty() {
            return Input::Upload(path);
        }
    }
    Input::Text(trimmed)
}

/// Run an interactive session until `/quit` or EOF.
pub async fn run_chat(dispatcher: &Dispatcher, document: Option<&Path>) -> Result<()> {
    let mut session = Session::new(dispatcher.config().session.greeting.clone());
    tracing::info!(session = %session.id(), "terminal session started");

    println!("{}", session.conversation().render());

    if let Some(path) = document {
        upload_file(dispatcher, &mut session, path).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };

        match parse_input(&line) {
            Input::Quit => break,
            Input::Blank => continue,
            Input::Upload(path) => upload_file(dispatcher, &mut session, Path::new(path)).await,
            Input::Text(text) => {
                println!("thinking…");
                match dispatcher.submit(&mut session, text).await {
                    Ok(reply) => {
                        print_turn(&reply.turn);
                        if !reply.sources.is_empty() {
                            println!("({} passages from the document)", reply.sources.len());
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    tracing::info!(
        session = %session.id(),
        turns = session.conversation().len(),
        "terminal session ended"
    );
    Ok(())
}

async fn upload_file(dispatcher: &Dispatcher, session: &mut Session, path: &Path) {
    let Some(content_type) = content_type_for_path(path) else {
        println!(
            "Unsupported file type: {} (expected .pdf or .txt)",
            path.display()
        );
        return;
    };
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => {
            println!("Could not read {}: {}", path.display(), e);
            return;
        }
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    println!("processing {}…", name);
    match dispatcher.upload(session, &name, &bytes, content_type).await {
        Ok(UploadOutcome::Loaded) => print_turn(session.conversation().last()),
        Ok(UploadOutcome::Reused) => println!("{} is already loaded.", name),
        Err(DispatchError::Ingest(e)) => println!("Could not read {}: {}", name, e),
        Err(e) => println!("{}", e),
    }
}

fn print_turn(turn: &Turn) {
    println!("**{}**: {}", turn.role().label(), turn.content());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("  /exit "), Input::Quit);
        assert_eq!(parse_input("/upload notes.txt"), Input::Upload("notes.txt"));
        assert_eq!(parse_input("   "), Input::Blank);
    }

    #[test]
    fn bare_upload_is_plain_text() {
        assert_eq!(parse_input("/upload"), Input::Text("/upload"));
        assert_eq!(
            parse_input("Fix my grammar: He go to store."),
            Input::Text("Fix my grammar: He go to store.")
        );
    }
}
