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
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Append-only session log, timestamped per line and flushed on every write
pub struct Logger {
    writer: BufWriter<std::fs::File>,
}

impl Logger {
    pub fn new(log_path: &Path) -> Result<Self> {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

        Ok(Self {
            writer: BufWriter::with_capacity(8192, file),
        })
    }

    pub fn logln(&mut self, message: &str) -> Result<()> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        for line in message.lines() {
            writeln!(self.writer, "[{}] {}", stamp, line)?;
        }
        if message.is_empty() {
            writeln!(self.writer, "[{}]", stamp)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Open a logger, degrading to `None` with a warning when the file can't be opened
pub fn open_optional(log_path: &Path) -> Option<Logger> {
    match Logger::new(log_path) {
        Ok(log) => Some(log),
        Err(e) => {
            eprintln!("Warning: {:#}. Continuing without a log file.", e);
            None
        }
    }
}

pub fn log_message(logger: &mut Option<Logger>, message: &str) {
    println!("{}", message);
    log_quiet(logger, message);
    let _ = io::stdout().flush();
}

pub fn log_warning(logger: &mut Option<Logger>, message: &str) {
    eprintln!("{}", message);
    log_quiet(logger, message);
    let _ = io::stderr().flush();
}

/// Write to the log file only
pub fn log_quiet(logger: &mut Option<Logger>, message: &str) {
    if let Some(log) = logger.as_mut() {
        let _ = log.logln(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_logln_timestamps_each_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ecrivez.log");
        let mut logger = Logger::new(&path).unwrap();

        logger.logln("first\nsecond").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
    }

    #[test]
    fn test_logger_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ecrivez.log");

        Logger::new(&path).unwrap().logln("one").unwrap();
        Logger::new(&path).unwrap().logln("two").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] one"));
        assert!(lines[1].ends_with("] two"));
    }

    #[test]
    fn test_open_optional_on_bad_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        assert!(open_optional(&blocker.join("ecrivez.log")).is_none());
    }
}
