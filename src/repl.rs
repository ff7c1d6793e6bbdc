// Copyright (c) 2025 Sean McNamara <smcnam@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::Value;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Settings;
use crate::constants::{ASSISTANT_PREFIX, DEFAULT_LOG_FILE, USER_PROMPT};
use crate::llm::{self, Message, Provider};
use crate::logger::{self, Logger, log_quiet};
use crate::nvim::{self, EditorConnector, NvimConnector};
use crate::project::{self, ProjectConfig};
use crate::prompts::{REPL_HELP, render_banner};
use crate::session;
use crate::tools::{ShellArgs, run_shell};

/// Terminates a multi-line `/apply` block
const APPLY_BLOCK_END: &str = ".";

/// How one line of REPL input is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Shell(&'a str),
    Json(&'a str),
    Apply(&'a str),
    Help,
    Quit,
    Chat(&'a str),
}

impl Input<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Input::Shell(_) => "shell",
            Input::Json(_) => "tool",
            Input::Apply(_) => "apply",
            Input::Help => "help",
            Input::Quit => "quit",
            Input::Chat(_) => "chat",
        }
    }
}

/// Checks run in a fixed order: `!`, `{`, `/apply`, meta commands, chat
pub fn classify(input: &str) -> Input<'_> {
    if let Some(command) = input.strip_prefix('!') {
        Input::Shell(command)
    } else if input.trim_start().starts_with('{') {
        Input::Json(input)
    } else if let Some(diff) = input.strip_prefix("/apply") {
        Input::Apply(diff.trim())
    } else {
        match input.trim() {
            "/help" => Input::Help,
            "/quit" | "/exit" => Input::Quit,
            _ => Input::Chat(input),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// In-memory conversation bound to one project and provider
pub struct ReplSession {
    project: ProjectConfig,
    provider: Box<dyn Provider>,
    editor: Box<dyn EditorConnector>,
    history: Vec<Message>,
    logger: Option<Logger>,
    store: Option<SessionStore>,
}

/// Where a session's history is written
struct SessionStore {
    root: PathBuf,
    id: String,
}

impl ReplSession {
    pub fn new(
        project: ProjectConfig,
        provider: Box<dyn Provider>,
        editor: Box<dyn EditorConnector>,
    ) -> Self {
        Self {
            project,
            provider,
            editor,
            history: Vec::new(),
            logger: None,
            store: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Persist history under `root` as session `id` after every turn
    pub fn with_store(mut self, root: &Path, id: &str) -> Self {
        self.store = Some(SessionStore {
            root: root.to_path_buf(),
            id: id.to_string(),
        });
        self
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn provider_name(&self) -> String {
        self.provider.name()
    }

    /// Handle one input line, recording the user and assistant turns
    pub fn process_input(&mut self, input: &str) -> Reply {
        let kind = classify(input);
        if !matches!(kind, Input::Help | Input::Quit) {
            self.history.push(Message::user(input));
            log_quiet(&mut self.logger, &format!("[{}] you: {}", kind.label(), input));
        }

        let reply = match kind {
            Input::Help => return Reply::Text(REPL_HELP.to_string()),
            Input::Quit => return Reply::Quit,
            Input::Shell(command) => run_shell(command),
            Input::Json(raw) => match invoke_tool(raw) {
                Some(reply) => reply,
                None => self.chat(),
            },
            Input::Apply(diff) => self.apply(diff),
            Input::Chat(_) => self.chat(),
        };

        log_quiet(
            &mut self.logger,
            &format!("[{}] {}: {}", kind.label(), self.provider.name(), reply),
        );
        self.history.push(Message::assistant(reply.clone()));
        self.checkpoint();
        Reply::Text(reply)
    }

    /// Write the history to disk; `None` when the session has no store
    pub fn save(&self) -> Result<Option<PathBuf>> {
        match &self.store {
            Some(store) => session::save_history(&store.root, &store.id, &self.history).map(Some),
            None => Ok(None),
        }
    }

    // A hard exit between turns must not lose the conversation
    fn checkpoint(&mut self) {
        if let Err(e) = self.save() {
            logger::log_warning(
                &mut self.logger,
                &format!("Warning: failed to save session: {:#}", e),
            );
        }
    }

    fn chat(&self) -> String {
        match self.provider.chat_completion(&self.history) {
            Ok(reply) => reply,
            Err(e) => format!("Provider error: {:#}", e),
        }
    }

    fn apply(&self, diff: &str) -> String {
        let result = self
            .editor
            .connect(&self.project.name)
            .and_then(|mut buffer| nvim::apply_diff(buffer.as_mut(), diff));

        match result {
            Ok(()) => "(diff applied)".to_string(),
            Err(e) => format!("Error applying diff: {:#}", e),
        }
    }
}

/// JSON tool call; `None` means the object is not a tool call and goes to chat
fn invoke_tool(raw: &str) -> Option<String> {
    let payload: Value = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(_) => return Some("Invalid JSON tool invocation".to_string()),
    };

    if payload.get("type").and_then(Value::as_str) != Some("tool") {
        return None;
    }

    let reply = match payload.get("tool").and_then(Value::as_str) {
        Some("shell") => {
            let args = match payload.get("cmd") {
                Some(Value::String(line)) => ShellArgs::Line(line.clone()),
                Some(Value::Array(items)) => ShellArgs::Argv(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect(),
                ),
                _ => ShellArgs::Line(String::new()),
            };
            run_shell(args)
        }
        Some(other) => format!("Unknown tool: {}", other),
        None => "Unknown tool: <none>".to_string(),
    };
    Some(reply)
}

pub enum LineEvent {
    Line(String),
    Eof,
    Interrupted,
}

pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<LineEvent>;
}

/// Line editing and history for interactive terminals
pub struct InteractiveSource {
    editor: DefaultEditor,
}

impl InteractiveSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new().context("Failed to initialize line editor")?,
        })
    }
}

impl LineSource for InteractiveSource {
    fn read_line(&mut self, prompt: &str) -> Result<LineEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(LineEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(LineEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(LineEvent::Eof),
            Err(e) => Err(e).context("Failed to read input"),
        }
    }
}

/// Piped stdin: one line per turn, no prompt
pub struct PipedSource<R: BufRead> {
    reader: R,
}

impl<R: BufRead> PipedSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for PipedSource<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<LineEvent> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).context("Failed to read input")? == 0 {
            return Ok(LineEvent::Eof);
        }
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        Ok(LineEvent::Line(line))
    }
}

/// Collect diff lines after a bare `/apply` until a lone `.`
fn read_apply_block(source: &mut dyn LineSource) -> Result<Option<String>> {
    let mut block = Vec::new();
    loop {
        match source.read_line("... ")? {
            LineEvent::Line(line) if line.trim() == APPLY_BLOCK_END => break,
            LineEvent::Line(line) => block.push(line),
            LineEvent::Eof => break,
            LineEvent::Interrupted => return Ok(None),
        }
    }
    Ok(Some(block.join("\n")))
}

/// Read-dispatch-print until EOF, Ctrl-C, `/quit` or a raised shutdown flag
pub fn run_loop(
    session: &mut ReplSession,
    source: &mut dyn LineSource,
    out: &mut dyn Write,
    shutdown: &AtomicBool,
) -> Result<()> {
    loop {
        let line = match source.read_line(USER_PROMPT)? {
            LineEvent::Line(line) => line,
            LineEvent::Eof => {
                writeln!(out)?;
                break;
            }
            LineEvent::Interrupted => {
                writeln!(out, "\nInterrupted – goodbye!")?;
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let input = if classify(&line) == Input::Apply("") {
            writeln!(out, "Paste the diff, then a line with a single '{}':", APPLY_BLOCK_END)?;
            match read_apply_block(source)? {
                Some(block) => format!("/apply\n{}", block),
                None => continue,
            }
        } else {
            line
        };

        match session.process_input(&input) {
            Reply::Text(text) => writeln!(out, "{}{}", ASSISTANT_PREFIX, text)?,
            Reply::Quit => break,
        }
        out.flush()?;

        if shutdown.load(Ordering::SeqCst) {
            writeln!(out, "\nInterrupted – goodbye!")?;
            break;
        }
    }
    Ok(())
}

fn log_path(root: &Path, settings: &Settings) -> PathBuf {
    match &settings.log_file {
        Some(path) => root.join(path),
        None => project::state_dir(root).join(DEFAULT_LOG_FILE),
    }
}

/// Interactive session, run in the workspace's lower pane or standalone
pub fn start_repl(settings: &Settings, resume: Option<String>, shutdown: &AtomicBool) -> Result<()> {
    let root = project::current_project_root()?;
    let project = ProjectConfig::load(&root)?;
    let provider = llm::choose_provider(&project, settings)?;

    let mut logger = logger::open_optional(&log_path(&root, settings));

    let (session_id, history) = match resume {
        Some(id) => {
            let history = session::load_history(&root, &id)?;
            if history.is_empty() {
                logger::log_warning(
                    &mut logger,
                    &format!("Warning: no saved history for session {}; starting fresh.", id),
                );
            }
            (id, history)
        }
        None => {
            let history = settings
                .system_prompt
                .iter()
                .map(|prompt| Message::system(prompt.clone()))
                .collect();
            (session::new_session_id(), history)
        }
    };

    log_quiet(
        &mut logger,
        &format!(
            "session={} provider={} project={}",
            session_id,
            provider.name(),
            project.name
        ),
    );

    let mut repl = ReplSession::new(project, provider, Box::new(NvimConnector))
        .with_history(history)
        .with_logger(logger)
        .with_store(&root, &session_id);

    println!("{}", render_banner(&repl.provider_name(), &session_id));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = if io::stdin().is_terminal() {
        let mut source = InteractiveSource::new()?;
        run_loop(&mut repl, &mut source, &mut out, shutdown)
    } else {
        let mut source = PipedSource::new(io::stdin().lock());
        run_loop(&mut repl, &mut source, &mut out, shutdown)
    };
    drop(out);

    // Persist even when the loop ended on an error; that error wins
    let saved = repl.save();
    if let Ok(Some(path)) = &saved {
        logger::log_message(&mut repl.logger, &format!("Session saved to {}", path.display()));
    }

    result.and(saved.map(|_| ()))
}
