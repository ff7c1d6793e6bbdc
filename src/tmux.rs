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
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use crate::config::Settings;
use crate::constants::{DEFAULT_EDITOR, SOCKET_WAIT_ATTEMPTS, SOCKET_WAIT_INTERVAL_MS, TMUX_SESSION_PREFIX};
use crate::nvim;
use crate::project::ProjectConfig;

static SESSION_UNSAFE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap());

/// tmux treats `.` and `:` as target separators, so keep names to a safe set
pub fn session_name(project_name: &str) -> String {
    format!(
        "{}{}",
        TMUX_SESSION_PREFIX,
        SESSION_UNSAFE_RE.replace_all(project_name, "_")
    )
}

/// `--editor`, then project config, then user settings, then nvim
pub fn resolve_editor(cli: Option<&str>, project: &ProjectConfig, settings: &Settings) -> String {
    cli.map(str::to_string)
        .or_else(|| project.editor.clone())
        .or_else(|| settings.editor.clone())
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string())
}

pub fn is_nvim(editor: &str) -> bool {
    editor
        .split_whitespace()
        .next()
        .and_then(|program| Path::new(program).file_name())
        .is_some_and(|name| name == "nvim")
}

fn quote(value: &str) -> String {
    shlex::try_quote(value)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Shell line typed into the editor pane; only nvim gets a listen socket
pub fn editor_command_line(editor: &str, socket: &Path, file: &str) -> String {
    if is_nvim(editor) {
        format!(
            "{} --listen {} {}",
            editor,
            quote(&socket.to_string_lossy()),
            quote(file)
        )
    } else {
        format!("{} {}", editor, quote(file))
    }
}

pub fn wait_for_socket(socket: &Path, attempts: u32, interval: Duration) -> bool {
    for _ in 0..attempts {
        if socket.exists() {
            return true;
        }
        thread::sleep(interval);
    }
    socket.exists()
}

pub fn tmux_available() -> bool {
    Command::new("tmux")
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn tmux(args: &[&str]) -> Result<Output> {
    let output = Command::new("tmux")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run tmux {}", args.join(" ")))?;

    if !output.status.success() {
        anyhow::bail!(
            "tmux {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output)
}

/// `=name` makes tmux match the session name exactly instead of by prefix
fn exact_target(session: &str) -> String {
    format!("={}", session)
}

fn has_session(session: &str) -> bool {
    Command::new("tmux")
        .args(["has-session", "-t", &exact_target(session)])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn attach(session: &str) -> Result<()> {
    // Inside tmux already: switch the client instead of nesting
    let verb = if std::env::var_os("TMUX").is_some() {
        "switch-client"
    } else {
        "attach-session"
    };

    let status = Command::new("tmux")
        .args([verb, "-t", &exact_target(session)])
        .status()
        .with_context(|| format!("Failed to run tmux {}", verb))?;

    if !status.success() {
        anyhow::bail!("tmux {} -t {} failed", verb, session);
    }
    Ok(())
}

/// Open the two-pane workspace: editor on top, REPL below
pub fn start_editor(
    root: &Path,
    project: &ProjectConfig,
    settings: &Settings,
    editor: Option<&str>,
    file: Option<&str>,
) -> Result<()> {
    if !tmux_available() {
        anyhow::bail!("tmux is not installed or not on PATH");
    }

    let session = session_name(&project.name);
    if has_session(&session) {
        println!("Attaching to existing session {}", session);
        return attach(&session);
    }

    let editor = resolve_editor(editor, project, settings);
    let file = file.unwrap_or(&project.name);
    let socket = nvim::socket_path(&project.name);
    let listen = is_nvim(&editor);

    // No session means no live editor behind an existing socket
    if listen && socket.exists() {
        let _ = fs::remove_file(&socket);
    }

    let root_str = root.to_string_lossy();
    let editor_pane = tmux(&[
        "new-session", "-d", "-s", &session, "-c", &root_str, "-P", "-F", "#{pane_id}",
    ])?;
    let editor_pane = String::from_utf8_lossy(&editor_pane.stdout).trim().to_string();

    let repl_pane = tmux(&[
        "split-window", "-v", "-t", &editor_pane, "-c", &root_str, "-P", "-F", "#{pane_id}",
    ])?;
    let repl_pane = String::from_utf8_lossy(&repl_pane.stdout).trim().to_string();

    let editor_line = editor_command_line(&editor, &socket, file);
    tmux(&["send-keys", "-t", &editor_pane, &editor_line, "Enter"])?;

    if listen
        && !wait_for_socket(
            &socket,
            SOCKET_WAIT_ATTEMPTS,
            Duration::from_millis(SOCKET_WAIT_INTERVAL_MS),
        )
    {
        eprintln!(
            "Warning: Neovim socket {} did not appear; /apply will be unavailable until it does.",
            socket.display()
        );
    }

    let exe = std::env::current_exe().context("Failed to locate the ecrivez executable")?;
    let repl_line = format!("{} repl", quote(&exe.to_string_lossy()));
    tmux(&["send-keys", "-t", &repl_pane, &repl_line, "Enter"])?;
    tmux(&["select-pane", "-t", &editor_pane])?;

    println!("Started tmux session {}", session);
    attach(&session)
}
