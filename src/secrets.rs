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

use std::env;

/// Providers whose keys we look for, in display order
pub const KNOWN_PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "mistral",
    "xai",
    "groq",
    "deepseek",
    "voyageai",
    "nomicai",
    "perplexity",
    "tavily",
    "huggingface",
    "gemini",
];

/// Environment variables consulted for a provider, highest priority first
pub fn env_vars_for(provider: &str) -> Vec<String> {
    let upper = provider.to_uppercase();
    vec![
        format!("{}_API_KEY", upper),
        format!("{}_API", upper),
        format!("ECRIVEZ_{}_API_KEY", upper),
    ]
}

pub fn api_key_for(provider: &str) -> Option<String> {
    api_key_from(provider, |name| env::var(name).ok())
}

pub fn api_key_from<F>(provider: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env_vars_for(provider)
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

pub fn available_providers() -> Vec<&'static str> {
    KNOWN_PROVIDERS
        .iter()
        .copied()
        .filter(|provider| api_key_for(provider).is_some())
        .collect()
}
