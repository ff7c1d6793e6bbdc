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

//! Built-in tools reachable from the REPL. Commands run with the user's
//! privileges and no sandbox.

use std::process::Command;

use crate::constants::NO_OUTPUT;

/// A command either as one shell-quoted line or as a ready argv
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellArgs {
    Line(String),
    Argv(Vec<String>),
}

impl From<&str> for ShellArgs {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for ShellArgs {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<String>> for ShellArgs {
    fn from(argv: Vec<String>) -> Self {
        Self::Argv(argv)
    }
}

impl From<&[&str]> for ShellArgs {
    fn from(argv: &[&str]) -> Self {
        Self::Argv(argv.iter().map(|s| s.to_string()).collect())
    }
}

/// Run a command and return its combined output as display text.
///
/// Never fails: parse, spawn and exit-status problems are reported in the
/// returned string.
pub fn run_shell(args: impl Into<ShellArgs>) -> String {
    let argv = match args.into() {
        ShellArgs::Line(line) => match shlex::split(&line) {
            Some(argv) => argv,
            None => return format!("Could not parse command: {}", line.trim()),
        },
        ShellArgs::Argv(argv) => argv,
    };

    let Some((program, rest)) = argv.split_first() else {
        return "No command given".to_string();
    };

    let output = match Command::new(program).args(rest).output() {
        Ok(output) => output,
        Err(e) => return format!("Failed to run {}: {}", program, e),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        return match output.status.code() {
            Some(code) => format!("Command failed with exit code {}:\n{}\n{}", code, stdout, stderr),
            None => format!("Command terminated by signal:\n{}\n{}", stdout, stderr),
        };
    }

    let mut combined = stdout.trim().to_string();
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr);
    }

    if combined.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        combined
    }
}
