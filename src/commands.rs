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

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::config::Settings;
use crate::constants::{DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::project::{self, ProjectConfig};
use crate::{repl, secrets, session, tmux};

pub fn cmd_init(
    settings: &Settings,
    name: String,
    model: Option<String>,
    provider: Option<String>,
    path: PathBuf,
) -> Result<()> {
    let model = settings.merge_with_cli(model, settings.model.clone(), DEFAULT_MODEL.to_string());
    let provider = settings.merge_with_cli(
        provider,
        settings.provider.clone(),
        DEFAULT_PROVIDER.to_string(),
    );

    let (root, name) = project::init_project(&name, &model, &provider, &path)?;
    println!("Initialized {} project", name);
    println!("  root:     {}", root.display());
    println!("  model:    {}", model);
    println!("  provider: {}", provider);

    Ok(())
}

pub fn cmd_config(model: Option<String>, editor: Option<String>, provider: Option<String>) -> Result<()> {
    let root = project::current_project_root()?;
    if model.is_none() && editor.is_none() && provider.is_none() {
        let config = ProjectConfig::load(&root)?;
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    project::modify_config(&root, model, editor, provider)?;
    println!("Updated configuration");
    Ok(())
}

pub fn cmd_chat(settings: &Settings, file: Option<String>, editor: Option<String>) -> Result<()> {
    let root = project::current_project_root()?;
    let config = ProjectConfig::load(&root)?;
    tmux::start_editor(&root, &config, settings, editor.as_deref(), file.as_deref())
}

pub fn cmd_repl(settings: &Settings, resume: Option<String>, shutdown_flag: &AtomicBool) -> Result<()> {
    repl::start_repl(settings, resume, shutdown_flag)
}

pub fn cmd_sessions() -> Result<()> {
    let root = project::current_project_root()?;
    let sessions = session::list_sessions(&root)?;

    if sessions.is_empty() {
        println!("No saved sessions");
        return Ok(());
    }

    for summary in sessions {
        println!(
            "{}  {}  {} message(s)",
            summary.id,
            summary.modified.format("%Y-%m-%d %H:%M"),
            summary.messages
        );
    }
    Ok(())
}

pub fn cmd_providers() -> Result<()> {
    let available = secrets::available_providers();
    if available.is_empty() {
        println!("No provider API keys found in the environment");
        println!("The echo and ollama providers work without a key.");
        return Ok(());
    }

    for provider in available {
        println!("{}", provider);
    }
    Ok(())
}
