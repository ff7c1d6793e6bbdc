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

pub const REPL_BANNER: &str =
    "🖋  Ecrivez REPL – provider = {provider}, session = {session}  (Ctrl-D to quit)\n";

pub const REPL_HELP: &str = r#"Input forms:
  !<command>                       run a shell command and show its output
  {"type":"tool","tool":"shell","cmd":"..."}
                                   invoke a built-in tool via JSON
  /apply <diff>                    apply +/- lines to the editor's current buffer
  /help                            show this message
  /quit, /exit                     end the session (Ctrl-D works too)
Anything else is sent to the model as chat."#;

pub fn render_banner(provider: &str, session: &str) -> String {
    REPL_BANNER
        .replace("{provider}", provider)
        .replace("{session}", session)
}
