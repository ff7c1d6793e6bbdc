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
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_REQUEST_TIMEOUT_SECS, OLLAMA_API_BASE, OPENAI_API_BASE, SETTINGS_DIR, SETTINGS_FILE,
};

/// User-level settings, shared by every project
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Model used when a project is initialized without --model
    pub model: Option<String>,

    /// Provider used when a project is initialized without --provider (openai, ollama, echo)
    pub provider: Option<String>,

    /// Editor launched by `ecrivez chat`
    pub editor: Option<String>,

    /// Fallback OpenAI key when neither the environment nor the project provides one
    pub openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    pub openai_base_url: Option<String>,

    pub ollama_base_url: Option<String>,

    /// Prepended as a system message to every fresh REPL session
    pub system_prompt: Option<String>,

    /// REPL log path; relative paths resolve against the project root
    pub log_file: Option<String>,

    pub request_timeout_seconds: Option<u64>,
}

impl Settings {
    /// Default location: $XDG_CONFIG_HOME/ecrivez/config.toml
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Load settings from a file, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        Ok(settings)
    }

    /// Load from an explicit path, or from the default location when none is given
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Merge a settings value with a CLI value, where CLI values take precedence
    pub fn merge_with_cli<T>(&self, cli_value: Option<T>, config_value: Option<T>, default_value: T) -> T {
        if let Some(cli_val) = cli_value {
            cli_val
        } else if let Some(config_val) = config_value {
            config_val
        } else {
            default_value
        }
    }

    pub fn openai_base_url(&self) -> String {
        self.openai_base_url
            .clone()
            .unwrap_or_else(|| OPENAI_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn ollama_base_url(&self) -> String {
        self.ollama_base_url
            .clone()
            .unwrap_or_else(|| OLLAMA_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert!(settings.model.is_none());
        assert_eq!(settings.openai_base_url(), OPENAI_API_BASE);
        assert_eq!(
            settings.request_timeout(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_load_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
model = "gpt-4o-mini"
editor = "vim"
ollama_base_url = "http://gpu-box:11434/"
request_timeout_seconds = 30
"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(settings.editor.as_deref(), Some("vim"));
        assert_eq!(settings.ollama_base_url(), "http://gpu-box:11434");
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = [unterminated").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse settings file"));
    }

    #[test]
    fn test_merge_precedence() {
        let settings = Settings::default();
        assert_eq!(
            settings.merge_with_cli(Some("cli"), Some("cfg"), "default"),
            "cli"
        );
        assert_eq!(settings.merge_with_cli(None, Some("cfg"), "default"), "cfg");
        assert_eq!(settings.merge_with_cli(None, None, "default"), "default");
    }
}
