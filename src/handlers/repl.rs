//! Interactive session over one persistent interpreter.
//!
//! Plain lines are appended to the editor buffer; lines starting with `:`
//! are commands. State the learner defines with `:run` survives until the
//! exercise or identity changes, or until the next `:submit`.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::dispatch::HostState;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::handlers::{ask::AskHandler, catalog::{describe, grading_note}, grade::GradeHandler, read_source, Options};
use crate::printer::{print_reply, print_verdict, MarkdownPrinter, TextPrinter};
use crate::session::Identity;
use crate::tutor::{LlmTutor, NOT_CONFIGURED};

const HELP: &str = "\
Lines are appended to the code buffer. Commands:
  :run              run the buffer
  :submit           grade the buffer on a fresh interpreter
  :reset            restore the exercise template
  :clear            empty the buffer
  :code             print the buffer
  :load FILE        replace the buffer with a file
  :exercise ID      switch exercise
  :show             describe the current exercise
  :status           learner, exercise, interpreter and last verdict
  :user ID          sign in as ID
  :anon             sign out
  :ask QUESTION     ask the tutor
  :help             this text
  :quit             leave";

/// What a command line asks the loop to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Submit,
    Reset,
    Clear,
    Code,
    Load(String),
    Exercise(String),
    Show,
    Status,
    User(String),
    Anonymous,
    Ask(String),
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parses a `:`-prefixed line. Plain code lines return `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_end().strip_prefix(':')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim().to_string()),
            None => (rest, String::new()),
        };
        let cmd = match (name, arg.is_empty()) {
            ("run" | "r", _) => Self::Run,
            ("submit" | "s", _) => Self::Submit,
            ("reset", _) => Self::Reset,
            ("clear", _) => Self::Clear,
            ("code", _) => Self::Code,
            ("load", false) => Self::Load(arg),
            ("exercise" | "x", false) => Self::Exercise(arg),
            ("show", _) => Self::Show,
            ("status", _) => Self::Status,
            ("user" | "u", false) => Self::User(arg),
            ("anon", _) => Self::Anonymous,
            ("ask", false) => Self::Ask(arg),
            ("help" | "h", _) => Self::Help,
            ("quit" | "q" | "exit", _) => Self::Quit,
            _ => Self::Unknown(rest.to_string()),
        };
        Some(cmd)
    }
}

pub struct ReplHandler;

impl ReplHandler {
    pub async fn run(cfg: &Config, catalog: Catalog, mut opts: Options) -> Result<()> {
        let mut engine = Engine::start(cfg, catalog, opts.identity.clone(), &opts.exercise).await?;
        let interactive = io::stdin().is_terminal();
        let tutor = LlmTutor::from_config(cfg, &opts.model).ok();

        if interactive {
            if let Ok(exercise) = engine.exercise() {
                TextPrinter { color: Some("cyan") }.print(&format!("Exercise {}: {}", exercise.id, exercise.title));
            }
            match engine.host_state() {
                HostState::Ready => {}
                HostState::Loading => println!("{}", "Python environment is still loading...".yellow()),
                HostState::Failed(reason) => println!("{}", reason.red()),
            }
            println!("Type :help for commands.");
        }
        let mut buffer = engine.session().code().to_string();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            if interactive {
                print!("{} ", format!("[{}]>", engine.session().exercise_id()).magenta());
                io::stdout().flush()?;
            }
            let Some(line) = lines.next_line().await? else { break };
            let Some(cmd) = Command::parse(&line) else {
                buffer.push_str(&line);
                buffer.push('\n');
                continue;
            };

            let exercise_id = engine.session().exercise_id().to_string();
            let result: Result<(), EngineError> = match cmd {
                Command::Run => match engine.run(&exercise_id, &buffer).await {
                    Ok(text) => {
                        if !text.is_empty() {
                            println!("{}", text);
                        }
                        Ok(())
                    }
                    Err(err) => Err(err),
                },
                Command::Submit => match engine.submit(&exercise_id, &buffer).await {
                    Ok(verdict) => {
                        print_verdict(&verdict);
                        if opts.feedback {
                            if let Ok(exercise) = engine.exercise() {
                                GradeHandler::feedback(cfg, &opts, exercise, &buffer, &verdict).await;
                            }
                        }
                        Ok(())
                    }
                    Err(err) => Err(err),
                },
                Command::Reset => engine.reset(&exercise_id).map(|template| buffer = template),
                Command::Clear => {
                    buffer.clear();
                    Ok(())
                }
                Command::Code => {
                    print!("{}", buffer);
                    if !buffer.ends_with('\n') {
                        println!();
                    }
                    Ok(())
                }
                Command::Load(path) => {
                    match read_source(Path::new(&path)) {
                        Ok(code) => {
                            engine.edit(&code);
                            buffer = code;
                        }
                        Err(err) => eprintln!("{}", err.red()),
                    }
                    Ok(())
                }
                Command::Exercise(id) => engine.switch_exercise(&id).map(|_| {
                    opts.exercise = engine.session().exercise_id().to_string();
                    buffer = engine.session().code().to_string();
                }),
                Command::Show => {
                    if let Ok(exercise) = engine.exercise() {
                        let mut text = describe(exercise);
                        text.push_str(&grading_note(engine.harness(), &exercise.id));
                        if opts.markdown {
                            MarkdownPrinter::default().print(&text);
                        } else {
                            println!("{}", text);
                        }
                    }
                    Ok(())
                }
                Command::Status => {
                    Self::print_status(&engine);
                    Ok(())
                }
                Command::User(id) => Self::switch_identity(&mut engine, &mut opts, &mut buffer, Identity::User(id)).await,
                Command::Anonymous => Self::switch_identity(&mut engine, &mut opts, &mut buffer, Identity::Anonymous).await,
                Command::Ask(question) => {
                    engine.edit(&buffer);
                    match &tutor {
                        Some(tutor) => match AskHandler::ask(cfg, tutor, engine.catalog(), &opts, &question, &buffer).await {
                            Ok(reply) => print_reply(&reply, opts.markdown),
                            Err(err) => eprintln!("{}", err.red()),
                        },
                        None => print_reply(NOT_CONFIGURED, false),
                    }
                    Ok(())
                }
                Command::Help => {
                    println!("{}", HELP);
                    Ok(())
                }
                Command::Quit => break,
                Command::Unknown(text) => {
                    eprintln!("unknown command :{} (try :help)", text);
                    Ok(())
                }
            };

            if let Err(err) = result {
                eprintln!("{}", err.to_string().red());
                if err.is_fatal() {
                    break;
                }
            }
        }

        engine.shutdown().await
    }

    fn print_status(engine: &Engine) {
        let session = engine.session();
        let host = match engine.host_state() {
            HostState::Loading => "loading".to_string(),
            HostState::Ready if session.reset_pending() => "ready, resets on next run".to_string(),
            HostState::Ready => "ready".to_string(),
            HostState::Failed(reason) => format!("failed ({})", reason),
        };
        println!("learner:  {}", session.identity());
        println!("exercise: {}", session.exercise_id());
        println!("python:   {}", host);
        let editor = if session.code() == session.template() { "template" } else { "edited" };
        println!("code:     {}", editor);
        match session.verdict() {
            Some(verdict) => print_verdict(verdict),
            None => println!("not submitted yet"),
        }
    }

    async fn switch_identity(
        engine: &mut Engine,
        opts: &mut Options,
        buffer: &mut String,
        identity: Identity,
    ) -> Result<(), EngineError> {
        let switched = engine.switch_identity(identity).await;
        opts.identity = engine.session().identity().clone();
        *buffer = engine.session().code().to_string();
        switched.map(|_| ())
    }
}
