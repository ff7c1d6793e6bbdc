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

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::constants::{DEFAULT_LOG_FILE, DEFAULT_PROVIDER, PROJECT_CONFIG_FILE, PROJECT_DIR, SESSIONS_DIR};

/// Contents of `.ecrivez/config.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: String,
    pub model: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    state_dir(root).join(PROJECT_CONFIG_FILE)
}

impl ProjectConfig {
    pub fn new(name: &str, model: &str, provider: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            provider: provider.to_string(),
            editor: None,
            openai_api_key: None,
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = config_path(root);
        if !path.exists() {
            anyhow::bail!("not inside an Ecrivez project – run 'ecrivez init' first.");
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read project config: {}", path.display()))?;

        serde_yaml::from_str(&content)
            .map_err(|e| anyhow!("Config validation error in {}:\n{}", path.display(), e))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = config_path(root);
        let yaml = serde_yaml::to_string(self).context("Failed to serialize project config")?;
        fs::write(&path, yaml)
            .with_context(|| format!("Failed to write project config: {}", path.display()))
    }
}

/// Walk up from `start` to the first directory holding `.ecrivez/config.yaml`
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| config_path(dir).is_file())
        .map(Path::to_path_buf)
}

/// Same as `find_project_root`, starting at the working directory
pub fn current_project_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    find_project_root(&cwd)
        .ok_or_else(|| anyhow!("not inside an Ecrivez project – run 'ecrivez init' first."))
}

fn validate_name(name: &str) -> Result<()> {
    if name.contains('/') || name.contains('\\') || name == ".." {
        anyhow::bail!("Invalid project name '{}': use a plain directory name", name);
    }
    Ok(())
}

/// Create a project: directory, git repository, `.ecrivez/config.yaml`.
///
/// A non-empty `name` other than `.` creates `base_dir/name`; otherwise
/// `base_dir` itself becomes the project and lends it its directory name.
/// Returns the project root together with the resolved name.
pub fn init_project(name: &str, model: &str, provider: &str, base_dir: &Path) -> Result<(PathBuf, String)> {
    let (root, name) = if !name.is_empty() && name != "." {
        validate_name(name)?;
        (base_dir.join(name), name.to_string())
    } else {
        let root = base_dir
            .canonicalize()
            .with_context(|| format!("Project path does not exist: {}", base_dir.display()))?;
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Project name or path is required"))?;
        (root, name)
    };

    let state = state_dir(&root);
    if state.exists() {
        anyhow::bail!(
            "Project already initialized: {} exists",
            state.display()
        );
    }

    fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create project directory: {}", root.display()))?;

    if !root.join(".git").exists() {
        git_init(&root)?;
    }

    fs::create_dir(&state)
        .with_context(|| format!("Failed to create {}", state.display()))?;

    ProjectConfig::new(&name, model, provider).save(&root)?;
    ensure_gitignore(&root)?;

    Ok((root, name))
}

fn git_init(root: &Path) -> Result<()> {
    let status = Command::new("git")
        .args(["init", "--quiet"])
        .current_dir(root)
        .stdout(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => anyhow::bail!(
            "git init failed in {} (exit code {})",
            root.display(),
            status.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
        ),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            eprintln!("Warning: git not found; skipping repository initialization.");
            Ok(())
        }
        Err(e) => Err(e).context("Failed to run git init"),
    }
}

/// Keep per-session artifacts out of version control
fn ensure_gitignore(root: &Path) -> Result<()> {
    let path = root.join(".gitignore");
    let existing = if path.exists() {
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        String::new()
    };

    let wanted = [
        format!("{}/{}/", PROJECT_DIR, SESSIONS_DIR),
        format!("{}/{}", PROJECT_DIR, DEFAULT_LOG_FILE),
    ];

    let mut content = existing.clone();
    for entry in &wanted {
        if existing.lines().any(|line| line.trim() == entry) {
            continue;
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(entry);
        content.push('\n');
    }

    if content != existing {
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Update selected fields of the project config in place
pub fn modify_config(
    root: &Path,
    model: Option<String>,
    editor: Option<String>,
    provider: Option<String>,
) -> Result<ProjectConfig> {
    if !config_path(root).exists() {
        anyhow::bail!("No Ecrivez configuration found. Run 'ecrivez init' first.");
    }

    let mut config = ProjectConfig::load(root)?;
    if let Some(model) = model {
        config.model = model;
    }
    if let Some(editor) = editor {
        config.editor = Some(editor);
    }
    if let Some(provider) = provider {
        config.provider = provider;
    }

    config.save(root)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(root: &Path, yaml: &str) {
        fs::create_dir_all(state_dir(root)).unwrap();
        fs::write(config_path(root), yaml).unwrap();
    }

    #[test]
    fn test_init_project_creates_layout() {
        let dir = TempDir::new().unwrap();
        let (root, name) = init_project("demo", "gpt-4o", "openai", dir.path()).unwrap();

        assert_eq!(name, "demo");
        assert_eq!(root, dir.path().join("demo"));
        assert!(config_path(&root).is_file());

        let config = ProjectConfig::load(&root).unwrap();
        assert_eq!(config, ProjectConfig::new("demo", "gpt-4o", "openai"));

        let gitignore = fs::read_to_string(root.join(".gitignore")).unwrap();
        assert!(gitignore.contains(".ecrivez/sessions/"));
        assert!(gitignore.contains(".ecrivez/ecrivez.log"));
    }

    #[test]
    fn test_init_in_place_uses_directory_name() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("novel");
        fs::create_dir(&target).unwrap();

        let (root, name) = init_project(".", "llama3.1", "ollama", &target).unwrap();
        assert_eq!(name, "novel");
        assert_eq!(ProjectConfig::load(&root).unwrap().provider, "ollama");
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        init_project("demo", "gpt-4o", "echo", dir.path()).unwrap();
        let err = init_project("demo", "gpt-4o", "echo", dir.path()).unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }

    #[test]
    fn test_init_rejects_nested_name() {
        let dir = TempDir::new().unwrap();
        assert!(init_project("a/b", "gpt-4o", "echo", dir.path()).is_err());
    }

    #[test]
    fn test_gitignore_entries_not_duplicated() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/\n.ecrivez/sessions/").unwrap();

        ensure_gitignore(dir.path()).unwrap();
        ensure_gitignore(dir.path()).unwrap();

        let gitignore = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(gitignore, "target/\n.ecrivez/sessions/\n.ecrivez/ecrivez.log\n");
    }

    #[test]
    fn test_load_valid_config_defaults_optional_fields() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "name: demo\nmodel: gpt-4o\nprovider: echo\n");

        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.provider, "echo");
        assert!(config.openai_api_key.is_none());
        assert!(config.editor.is_none());
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "name: demo\nmodel: gpt-4o\nprovider: echo\nfoo: bar\n");

        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Config validation error"));
    }

    #[test]
    fn test_load_outside_project() {
        let dir = TempDir::new().unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("ecrivez init"));
    }

    #[test]
    fn test_modify_config_keeps_schema_valid() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "name: demo\nmodel: gpt-4o\n");

        let updated = modify_config(dir.path(), None, Some("helix".to_string()), None).unwrap();
        assert_eq!(updated.editor.as_deref(), Some("helix"));
        assert_eq!(updated.model, "gpt-4o");

        let reloaded = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(reloaded, updated);
        assert_eq!(reloaded.provider, DEFAULT_PROVIDER);
    }

    #[test]
    fn test_modify_config_without_project() {
        let dir = TempDir::new().unwrap();
        assert!(modify_config(dir.path(), Some("x".to_string()), None, None).is_err());
    }

    #[test]
    fn test_find_project_root_from_nested_dir() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "name: demo\nmodel: gpt-4o\n");
        let nested = dir.path().join("chapters").join("one");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), Some(dir.path().to_path_buf()));
    }
}
