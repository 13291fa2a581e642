//! Line-oriented chat loop.
//!
//! Plain lines are sent as messages; lines starting with `:` are commands.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use ochat_core::config::LocalState;
use ochat_core::core::interrupt::{self, InterruptedError};
use ochat_core::core::session::{DialogSession, TurnOutcome};
use ochat_core::render::CodeAction;
use tokio::sync::mpsc;

use super::terminal::{TerminalView, USER_PREFIX};

const HELP: &str = "\
Commands:
  :q            quit
  :new          start a new dialog
  :copy         print the last reply
  :copy N       print code block N of the last reply
  :run N        execute python code block N on the server
  :model NAME   switch model
  :help         show this help";

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    New,
    Help,
    CopyReply,
    Copy(usize),
    Run(usize),
    Model(&'a str),
    Message(&'a str),
    Invalid(String),
}

fn parse(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    let Some(command) = trimmed.strip_prefix(':') else {
        return Input::Message(trimmed);
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));

    let block = |make: fn(usize) -> Input<'static>| match arg.parse::<usize>() {
        Ok(n) if n > 0 => make(n),
        _ => Input::Invalid(format!("Usage: :{name} N (N counts from 1)")),
    };

    match name {
        "q" | "quit" => Input::Quit,
        "new" => Input::New,
        "help" => Input::Help,
        "copy" if arg.is_empty() => Input::CopyReply,
        "copy" => block(Input::Copy),
        "run" => block(Input::Run),
        "model" if !arg.is_empty() => Input::Model(arg),
        "model" => Input::Invalid("Usage: :model NAME".to_string()),
        _ => Input::Invalid(format!("Unknown command :{name}. Type :help for commands.")),
    }
}

/// Reads lines on a separate thread so the loop can also wait for Ctrl+C.
fn spawn_line_reader<R>(input: R) -> mpsc::UnboundedReceiver<io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in input.lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Runs the chat loop until `:q` or end of input.
///
/// # Errors
/// Returns [`InterruptedError`] when Ctrl+C arrives while waiting for input.
pub async fn run<R, W, E>(
    input: R,
    session: &mut DialogSession,
    view: &mut TerminalView<W, E>,
    interactive: bool,
) -> Result<()>
where
    R: BufRead + Send + 'static,
    W: Write,
    E: Write,
{
    if interactive {
        view.prompt(USER_PREFIX);
    }

    let mut lines = spawn_line_reader(input);
    loop {
        let next = tokio::select! {
            () = interrupt::wait_for_interrupt() => {
                view.warn("Interrupted.");
                return Err(InterruptedError.into());
            }
            line = lines.recv() => line,
        };
        let Some(line) = next else { break };
        let line = line?;
        match parse(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::New => {
                session.reset();
                view.say("Started a new dialog.");
            }
            Input::Help => view.say(HELP),
            Input::CopyReply => match view.last_reply() {
                Some(reply) => {
                    let reply = reply.to_string();
                    view.say(reply.trim_end_matches('\n'));
                }
                None => view.warn("No reply to copy yet."),
            },
            Input::Copy(n) => match view.code_block(n) {
                Some(block) => {
                    let code = block.code.clone();
                    view.say(code.trim_end_matches('\n'));
                }
                None => view.warn(&format!("No code block {n} in the last reply.")),
            },
            Input::Run(n) => run_block(session, view, n).await,
            Input::Model(name) => {
                session.set_model(name);
                let state = LocalState {
                    selected_model: Some(name.to_string()),
                };
                if let Err(err) = state.save() {
                    tracing::warn!("saving selected model failed: {err:#}");
                }
                view.say(&format!("Model set to {name}."));
            }
            Input::Message(text) => {
                if let TurnOutcome::Failed(err) = session.submit_turn(text, view).await {
                    tracing::debug!(kind = %err.kind, "turn failed");
                }
            }
            Input::Invalid(message) => view.warn(&message),
        }

        if interactive {
            view.prompt(USER_PREFIX);
        }
    }

    view.say("Goodbye!");
    Ok(())
}

async fn run_block<W: Write, E: Write>(
    session: &DialogSession,
    view: &mut TerminalView<W, E>,
    n: usize,
) {
    let Some(block) = view.code_block(n) else {
        view.warn(&format!("No code block {n} in the last reply."));
        return;
    };
    if !block.allows(CodeAction::Execute) {
        view.warn(&format!("Code block {n} cannot be executed."));
        return;
    }
    let code = block.code.clone();

    match session.execute_code(&code).await {
        Ok(output) => view.say(&format!("output>\n{}", output.text.trim_end())),
        Err(err) => {
            tracing::warn!(kind = %err.kind, "code execution failed: {err}");
            view.warn(&format!("Error: {err}"));
        }
    }
}
