//! Line-oriented chat REPL and the one-shot `say` command

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::commands::{process_input, CommandResult};
use crate::core::config::path_display;
use crate::core::gateway::StreamMessage;
use crate::core::session::{ChatSession, SessionError, TurnOutcome};

/// Echo streamed chunks to stdout until `End`. Provider errors go to stderr
/// ahead of the offline reply that replaces them.
fn spawn_printer(mut rx: mpsc::UnboundedReceiver<StreamMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut printed = false;
        while let Some(message) = rx.recv().await {
            match message {
                StreamMessage::Chunk(content) => {
                    print!("{content}");
                    let _ = io::stdout().flush();
                    printed = true;
                }
                StreamMessage::Error(err) => {
                    if printed {
                        println!();
                        printed = false;
                    }
                    eprintln!("⚠️  {err}; answering offline");
                }
                StreamMessage::End => break,
            }
        }
        if printed {
            println!();
        }
    })
}

/// Submit one turn while streaming the reply to the terminal.
pub async fn send_turn(session: &mut ChatSession, text: &str) -> Result<TurnOutcome, SessionError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_printer(rx);
    let result = session.submit(text, Some(&tx)).await;
    drop(tx);
    let _ = printer.await;
    result
}

fn report_outcome(session: &ChatSession, outcome: &TurnOutcome) {
    if outcome.dropped_attachment {
        eprintln!(
            "⚠️  {} does not accept images; the attachment was not sent",
            session.model().display_name
        );
    }
    if let Some(err) = &outcome.save_error {
        eprintln!("⚠️  Conversation could not be saved: {err}");
    }
}

pub async fn run_chat(
    mut session: ChatSession,
    conversation: Option<String>,
) -> Result<(), Box<dyn Error>> {
    if let Some(id) = conversation {
        let conversation = session.open(&id)?;
        println!(
            "Resuming \"{}\" ({} message(s))",
            conversation.title,
            conversation.messages.len()
        );
    }

    eprintln!("🚀 Nexus chat");
    eprintln!("🤖 Model: {}", session.model().display_name);
    eprintln!("💾 Store: {}", path_display(session.store().path()));
    if !session.is_live() {
        eprintln!("📴 No completion backend configured; replies come from the offline responder");
    }
    eprintln!("💡 Type /help for commands, /quit to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut unsaved = false;

    loop {
        print!("you> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match process_input(&mut session, &line) {
            CommandResult::Continue(text) => {
                if !text.is_empty() {
                    println!("{text}");
                }
            }
            CommandResult::Quit => break,
            CommandResult::ProcessAsMessage(text) => {
                print!("{}> ", session.model().display_name);
                io::stdout().flush()?;
                match send_turn(&mut session, &text).await {
                    Ok(outcome) => {
                        unsaved |= outcome.save_error.is_some();
                        report_outcome(&session, &outcome);
                    }
                    Err(err) => eprintln!("\n❌ {err}"),
                }
            }
        }
    }

    if unsaved {
        session.store().flush()?;
    }
    Ok(())
}

pub async fn run_say(
    mut session: ChatSession,
    prompt: String,
    image: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    if let Some(path) = image {
        let bytes = std::fs::read(&path)
            .map_err(|err| format!("cannot read {}: {err}", path_display(&path)))?;
        session.attach_image(bytes)?;
    }

    let outcome = send_turn(&mut session, &prompt).await?;
    report_outcome(&session, &outcome);
    if let Some(err) = outcome.save_error {
        return Err(err.into());
    }
    Ok(())
}
