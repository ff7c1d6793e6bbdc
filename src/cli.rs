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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ecrivez")]
#[command(about = "Pair an editor with an LLM chat REPL inside a tmux session")]
#[command(version)]
pub struct Cli {
    /// Path to the user settings file (defaults to $XDG_CONFIG_HOME/ecrivez/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new Ecrivez project
    Init {
        /// Project and directory name; empty or "." initializes the target directory itself
        #[arg(long, default_value = "")]
        name: String,

        /// Default LLM model to use (defaults to the settings model, then gpt-4o)
        #[arg(long)]
        model: Option<String>,

        /// Provider backing the REPL (openai, ollama, echo)
        #[arg(long)]
        provider: Option<String>,

        /// Directory the project is created in
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Modify the current project's configuration
    Config {
        /// LLM model to use
        #[arg(long)]
        model: Option<String>,

        /// Editor to use
        #[arg(long)]
        editor: Option<String>,

        /// Provider to use
        #[arg(long)]
        provider: Option<String>,
    },

    /// Start a tmux session with the editor and the chat REPL side by side
    Chat {
        /// Filename to open (defaults to the project name)
        #[arg(long)]
        file: Option<String>,

        /// Editor command, overriding the project and settings
        #[arg(long)]
        editor: Option<String>,
    },

    /// Run the chat REPL in the current terminal
    Repl {
        /// Continue a saved session by id
        #[arg(long)]
        resume: Option<String>,
    },

    /// List saved REPL sessions of the current project
    Sessions,

    /// List providers with an API key available in the environment
    Providers,
}
