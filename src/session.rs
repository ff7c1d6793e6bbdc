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
use chrono::{DateTime, Local};
use fs2::FileExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::constants::{LAST_SESSION_FILE, SESSIONS_DIR};
use crate::llm::Message;
use crate::project::state_dir;

static SESSION_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Za-z_-]+$").unwrap());

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub modified: DateTime<Local>,
    pub messages: usize,
}

pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn sessions_dir(root: &Path) -> PathBuf {
    state_dir(root).join(SESSIONS_DIR)
}

pub fn session_file(root: &Path, id: &str) -> Result<PathBuf> {
    if !SESSION_ID_RE.is_match(id) {
        anyhow::bail!("Invalid session id: {}", id);
    }
    Ok(sessions_dir(root).join(format!("{}.jsonl", id)))
}

/// Write one message per line under an exclusive lock
fn write_jsonl(path: &Path, history: &[Message]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open session file: {}", path.display()))?;

    file.lock_exclusive()
        .with_context(|| format!("Failed to lock session file: {}", path.display()))?;
    file.set_len(0)?;

    let mut writer = BufWriter::new(&file);
    for message in history {
        serde_json::to_writer(&mut writer, message)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    drop(writer);

    FileExt::unlock(&file)?;
    Ok(())
}

/// Persist the conversation and mirror it to `last_session.jsonl`
pub fn save_history(root: &Path, id: &str, history: &[Message]) -> Result<PathBuf> {
    let path = session_file(root, id)?;
    let dir = sessions_dir(root);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create sessions directory: {}", dir.display()))?;

    write_jsonl(&path, history)?;
    write_jsonl(&dir.join(LAST_SESSION_FILE), history)?;
    Ok(path)
}

/// A session that was never saved loads as an empty history
pub fn load_history(root: &Path, id: &str) -> Result<Vec<Message>> {
    let path = session_file(root, id)?;
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| {
                format!("Malformed message on line {} of {}", index + 1, path.display())
            })
        })
        .collect()
}

/// Saved sessions, newest first
pub fn list_sessions(root: &Path) -> Result<Vec<SessionSummary>> {
    let dir = sessions_dir(root);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("Failed to read sessions directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some(LAST_SESSION_FILE) {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let modified: DateTime<Local> = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("Failed to stat session file: {}", path.display()))?
            .into();
        let messages = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count();

        sessions.push(SessionSummary {
            id: id.to_string(),
            modified,
            messages,
        });
    }

    sessions.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)));
    Ok(sessions)
}
