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

pub const DEFAULT_MODEL: &str = "gpt-4o";

pub const DEFAULT_PROVIDER: &str = "openai";

pub const DEFAULT_EDITOR: &str = "nvim";

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub const OLLAMA_API_BASE: &str = "http://localhost:11434";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Per-project state directory, relative to the project root.
pub const PROJECT_DIR: &str = ".ecrivez";

pub const PROJECT_CONFIG_FILE: &str = "config.yaml";

pub const SESSIONS_DIR: &str = "sessions";

pub const LAST_SESSION_FILE: &str = "last_session.jsonl";

pub const DEFAULT_LOG_FILE: &str = "ecrivez.log";

/// User-level settings file under the XDG config dir.
pub const SETTINGS_DIR: &str = "ecrivez";

pub const SETTINGS_FILE: &str = "config.toml";

pub const TMUX_SESSION_PREFIX: &str = "ecrivez-";

/// Neovim listens here for the project named `{name}`.
pub const NVIM_SOCKET_TEMPLATE: &str = "nvim-ecrivez-{name}.sock";

pub const SOCKET_WAIT_ATTEMPTS: u32 = 20;

pub const SOCKET_WAIT_INTERVAL_MS: u64 = 100;

pub const USER_PROMPT: &str = "you › ";

pub const ASSISTANT_PREFIX: &str = "llm › ";

pub const NO_OUTPUT: &str = "<no output>";

pub fn render_socket_name(project_name: &str) -> String {
    NVIM_SOCKET_TEMPLATE.replace("{name}", project_name)
}
