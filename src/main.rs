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

mod cli;
mod commands;
mod config;
mod constants;
mod llm;
mod logger;
mod nvim;
mod project;
mod prompts;
mod repl;
mod secrets;
mod session;
mod tmux;
mod tools;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cli::{Cli, Commands};
use crate::config::Settings;

fn main() -> Result<()> {
    // First Ctrl+C lets the current turn finish and the session save; a second one exits
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown_flag);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            eprintln!("\nInterrupted. Exiting.");
            std::process::exit(130);
        }
        eprintln!("\nInterrupt received; finishing the current turn (Ctrl+C again to exit now).");
    })
    .context("Error setting Ctrl-C handler")?;

    let cli = Cli::parse();
    let settings = Settings::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Init {
            name,
            model,
            provider,
            path,
        } => commands::cmd_init(&settings, name, model, provider, path),
        Commands::Config {
            model,
            editor,
            provider,
        } => commands::cmd_config(model, editor, provider),
        Commands::Chat { file, editor } => commands::cmd_chat(&settings, file, editor),
        Commands::Repl { resume } => commands::cmd_repl(&settings, resume, &shutdown_flag),
        Commands::Sessions => commands::cmd_sessions(),
        Commands::Providers => commands::cmd_providers(),
    }
}
