//! shale REPL — the interactive driver.
//!
//! Reads one input unit per line, evaluates it against a persistent
//! [`Session`], prints the produced value, and reports errors without
//! terminating: runtime failures unwind to this loop exactly once and
//! the session keeps accepting input.
//!
//! Meta-commands: `/help`, `/quit`, `/vars`, `/names`.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use shale_kernel::{Session, Value};

/// Outcome of one processed line.
enum LineResult {
    /// Continue with optional output.
    Continue(Option<String>),
    /// Exit the REPL.
    Exit,
}

pub struct Repl {
    session: Session,
}

impl Repl {
    pub fn new() -> Result<Self> {
        let session = Session::new().context("failed to create session")?;
        Ok(Self { session })
    }

    /// Process a single line of input.
    fn process_line(&mut self, line: &str) -> LineResult {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineResult::Continue(None);
        }
        if trimmed.starts_with('/') {
            return self.handle_meta_command(trimmed);
        }

        match self.session.eval_source(trimmed) {
            Ok(value) => {
                let rendered = format_value(&value);
                LineResult::Continue(if rendered.is_empty() { None } else { Some(rendered) })
            }
            Err(e) => LineResult::Continue(Some(format!("error: {e}"))),
        }
    }

    fn handle_meta_command(&mut self, cmd: &str) -> LineResult {
        match cmd {
            "/quit" | "/q" | "/exit" => LineResult::Exit,
            "/help" | "/h" | "/?" => LineResult::Continue(Some(HELP_TEXT.to_string())),
            "/vars" => {
                let names = self.session.variable_names();
                if names.is_empty() {
                    LineResult::Continue(Some("(no variables set)".to_string()))
                } else {
                    LineResult::Continue(Some(names.join("\n")))
                }
            }
            "/names" => LineResult::Continue(Some(self.session.namespace_names().join("\n"))),
            other => LineResult::Continue(Some(format!(
                "Unknown command: {other}\nType /help for available commands."
            ))),
        }
    }
}

/// Render a value for REPL display. `None` renders empty (the line
/// produced nothing worth echoing); strings are quoted so they read as
/// values rather than output.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::None => String::new(),
        Value::Str(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

const HELP_TEXT: &str = r#"shale REPL

Meta commands:
  /help, /h, /?     Show this help
  /quit, /q, /exit  Exit the REPL
  /vars             List variables in the current frame
  /names            List every registered namespace binding

Language:
  x = value                  Assign a variable
  function f(number n) { }   Define a function (overloads by signature)
  namespace m { ... }        Declare a namespace
  using "path" as name       Load a namespace from a file
  if c { } elif c { } else { }
  for x in [1, 2, 3] { }
  "text ${expr} more"        String interpolation

Builtins:
  string.*  array.*  shell.*  env.*     (try /names)
"#;

fn history_path() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME").map(|home| std::path::Path::new(&home).join(".shale_history"))
}

/// Run the interactive REPL until EOF or `/quit`.
pub fn run() -> Result<()> {
    println!("shale v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, /quit to exit.");

    let mut rl: Editor<(), DefaultHistory> = Editor::new().context("failed to create editor")?;
    let history = history_path();
    if let Some(ref path) = history {
        // Missing history is expected on first run.
        let _ = rl.load_history(path);
    }

    let mut repl = Repl::new()?;
    println!();

    loop {
        match rl.readline("shale> ") {
            Ok(line) => {
                if let Err(e) = rl.add_history_entry(line.as_str()) {
                    tracing::warn!("failed to add history entry: {e}");
                }
                match repl.process_line(&line) {
                    LineResult::Continue(Some(output)) => println!("{output}"),
                    LineResult::Continue(None) => {}
                    LineResult::Exit => break,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    if let Some(ref path) = history {
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("failed to save history: {e}");
        }
    }

    Ok(())
}
