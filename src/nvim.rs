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

//! Talking to a running Neovim through its `--listen` socket.
//!
//! Everything goes through `nvim --server <socket> --remote-expr`, with buffer
//! contents handed over in temp files so no quoting of user text is needed.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

use crate::constants::render_socket_name;

/// The current buffer of a running editor
pub trait EditorBuffer {
    fn read_lines(&mut self) -> Result<Vec<String>>;
    fn replace_lines(&mut self, lines: &[String]) -> Result<()>;
    fn command(&mut self, command: &str) -> Result<()>;
}

/// Opens the editor buffer belonging to a project
pub trait EditorConnector {
    fn connect(&self, project_name: &str) -> Result<Box<dyn EditorBuffer>>;
}

pub fn socket_path(project_name: &str) -> PathBuf {
    std::env::temp_dir().join(render_socket_name(project_name))
}

/// Quote as a single-quoted Vim string literal
fn vim_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub struct NvimSocket {
    socket: PathBuf,
}

impl NvimSocket {
    pub fn connect(project_name: &str) -> Result<Self> {
        Self::at(socket_path(project_name))
    }

    pub fn at(socket: PathBuf) -> Result<Self> {
        if !socket.exists() {
            anyhow::bail!("Neovim socket not found at {}", socket.display());
        }
        Ok(Self { socket })
    }

    fn remote_expr(&self, expr: &str) -> Result<String> {
        let output = Command::new("nvim")
            .arg("--server")
            .arg(&self.socket)
            .arg("--remote-expr")
            .arg(expr)
            .output()
            .context("Failed to spawn nvim. Is Neovim installed?")?;

        if !output.status.success() {
            anyhow::bail!(
                "nvim --remote-expr failed on {}: {}",
                self.socket.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().context("Temp file path contains invalid UTF-8")
}

impl EditorBuffer for NvimSocket {
    fn read_lines(&mut self) -> Result<Vec<String>> {
        let dump = NamedTempFile::new().context("Failed to create temp file")?;
        self.remote_expr(&format!(
            "writefile(getline(1, '$'), {})",
            vim_string(path_str(dump.path())?)
        ))?;

        let content = fs::read_to_string(dump.path())
            .with_context(|| format!("Failed to read buffer dump: {}", dump.path().display()))?;
        Ok(content.lines().map(str::to_string).collect())
    }

    fn replace_lines(&mut self, lines: &[String]) -> Result<()> {
        let mut staged = lines.join("\n");
        if !lines.is_empty() {
            staged.push('\n');
        }

        let file = NamedTempFile::new().context("Failed to create temp file")?;
        fs::write(file.path(), staged)
            .with_context(|| format!("Failed to stage buffer: {}", file.path().display()))?;

        self.remote_expr(&format!(
            "nvim_buf_set_lines(0, 0, -1, v:false, readfile({}))",
            vim_string(path_str(file.path())?)
        ))?;
        Ok(())
    }

    fn command(&mut self, command: &str) -> Result<()> {
        self.remote_expr(&format!("execute({})", vim_string(command)))?;
        Ok(())
    }
}

pub struct NvimConnector;

impl EditorConnector for NvimConnector {
    fn connect(&self, project_name: &str) -> Result<Box<dyn EditorBuffer>> {
        Ok(Box::new(NvimSocket::connect(project_name)?))
    }
}

/// Naive patcher: `+x` appends `x`, `-x` drops the first line equal to `x`.
///
/// Every other line is ignored and a removal with no matching line is
/// skipped. Unified-diff file headers get no special treatment.
pub fn patch_lines(lines: &mut Vec<String>, diff: &str) {
    for line in diff.lines() {
        if line.is_empty() {
            continue;
        }
        if let Some(added) = line.strip_prefix('+') {
            lines.push(added.to_string());
        } else if let Some(removed) = line.strip_prefix('-') {
            if let Some(pos) = lines.iter().position(|l| l == removed) {
                lines.remove(pos);
            }
        }
    }
}

/// Patch the editor's current buffer and save it
pub fn apply_diff(buffer: &mut dyn EditorBuffer, diff: &str) -> Result<()> {
    let mut lines = buffer.read_lines()?;
    patch_lines(&mut lines, diff);
    buffer.replace_lines(&lines)?;
    buffer.command("write")
}
