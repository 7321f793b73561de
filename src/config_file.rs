use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG_NAME: &str = ".mergetailrc";

const MAX_ALIAS_DEPTH: usize = 10;

/// Contents of an rc file: a `defaults` argument line and named aliases
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub defaults: Option<String>,
    pub aliases: IndexMap<String, String>,
}

/// Where the loaded configuration came from
#[derive(Debug, Default, Clone)]
pub struct LoadedConfig {
    pub config: ConfigFile,
    pub project_path: Option<PathBuf>,
    pub user_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Walk up from `start` looking for `.mergetailrc`.
    pub fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PROJECT_CONFIG_NAME))
            .find(|candidate| candidate.is_file())
    }

    pub fn find_project_config() -> Option<PathBuf> {
        let cwd = env::current_dir().ok()?;
        Self::find_project_config_from(&cwd)
    }

    /// User config locations in order of preference
    pub fn user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(dirs::config_dir);
        if let Some(dir) = config_dir {
            paths.push(dir.join("mergetail").join("config.ini"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(PROJECT_CONFIG_NAME));
        }
        paths
    }

    /// Load the first user config, then layer the project config over it.
    pub fn load() -> Result<LoadedConfig> {
        let mut loaded = LoadedConfig::default();

        if let Some(path) = Self::user_config_paths().into_iter().find(|p| p.is_file()) {
            loaded.config = Self::load_from_path(&path)?;
            loaded.user_path = Some(path);
        }

        if let Some(path) = Self::find_project_config() {
            // The home rc is also found by the upward walk from inside $HOME
            if loaded.user_path.as_deref() != Some(path.as_path()) {
                let project = Self::load_from_path(&path)?;
                loaded.config = loaded.config.overlay(project);
                loaded.project_path = Some(path);
            }
        }

        Ok(loaded)
    }

    /// An explicit `--config-file` replaces the search entirely.
    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<LoadedConfig> {
        match custom_path {
            Some(path) => {
                let path = PathBuf::from(path);
                Ok(LoadedConfig {
                    config: Self::load_from_path(&path)?,
                    project_path: None,
                    user_path: Some(path),
                })
            }
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse INI-style content. Unknown sections and root keys are ignored.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut section = String::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_string();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                bail!("line {}: expected 'key = value', got '{}'", index + 1, line);
            };
            let (key, value) = (key.trim(), value.trim());

            match section.as_str() {
                "" if key == "defaults" => config.defaults = Some(value.to_string()),
                "aliases" => {
                    config.aliases.insert(key.to_string(), value.to_string());
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Values from `other` win; aliases are merged.
    fn overlay(mut self, other: Self) -> Self {
        if other.defaults.is_some() {
            self.defaults = other.defaults;
        }
        self.aliases.extend(other.aliases);
        self
    }

    /// Expand one alias, following `-a`/`--alias` references.
    pub fn resolve_alias(&self, name: &str) -> Result<Vec<String>> {
        self.resolve_alias_inner(name, &mut HashSet::new(), 0)
    }

    fn resolve_alias_inner(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        depth: usize,
    ) -> Result<Vec<String>> {
        if depth > MAX_ALIAS_DEPTH {
            bail!("Alias chain too deep: {} levels", depth);
        }
        if !seen.insert(name.to_string()) {
            bail!("Circular dependency detected in alias: {}", name);
        }

        let value = self
            .aliases
            .get(name)
            .ok_or_else(|| anyhow!("Unknown alias: {}", name))?;
        let args = shell_words::split(value)
            .with_context(|| format!("Invalid alias '{}': failed to parse arguments", name))?;

        let expanded = self.expand(args, seen, depth + 1)?;
        seen.remove(name);
        Ok(expanded)
    }

    fn expand(
        &self,
        args: Vec<String>,
        seen: &mut HashSet<String>,
        depth: usize,
    ) -> Result<Vec<String>> {
        let mut result = Vec::with_capacity(args.len());
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            if arg == "-a" || arg == "--alias" {
                let name = iter
                    .next()
                    .ok_or_else(|| anyhow!("Missing alias name after '{}'", arg))?;
                result.extend(self.resolve_alias_inner(&name, seen, depth)?);
            } else if let Some(name) = arg.strip_prefix("--alias=") {
                result.extend(self.resolve_alias_inner(name, seen, depth)?);
            } else {
                result.push(arg);
            }
        }
        Ok(result)
    }

    /// Insert `defaults` after the program name and expand aliases.
    pub fn process_args(&self, args: Vec<String>) -> Result<Vec<String>> {
        let mut args = args.into_iter();
        let mut result: Vec<String> = args.next().into_iter().collect();

        let mut rest = Vec::new();
        if let Some(defaults) = &self.defaults {
            rest.extend(
                shell_words::split(defaults)
                    .context("Invalid defaults: failed to parse arguments")?,
            );
        }
        rest.extend(args);

        result.extend(self.expand(rest, &mut HashSet::new(), 0)?);
        Ok(result)
    }
}

impl LoadedConfig {
    /// Human-readable summary for `--show-config`
    pub fn describe(&self) -> String {
        let mut out = String::from(
            "Configuration precedence: CLI > project .mergetailrc > user config > defaults\n",
        );

        let loaded_from: Vec<String> = [
            self.project_path.as_ref().map(|p| format!("Project: {}", p.display())),
            self.user_path.as_ref().map(|p| format!("User: {}", p.display())),
        ]
        .into_iter()
        .flatten()
        .collect();

        if loaded_from.is_empty() {
            out.push_str("\nNo configuration files found. Using defaults.\n");
            out.push_str("\nExample configuration file (.mergetailrc):\n\n");
            out.push_str("# Arguments applied to every mergetail command\n");
            out.push_str("defaults = --ts-format %H:%M:%S --stats\n\n");
            out.push_str("[aliases]\n");
            out.push_str("app = --docker --container web,worker\n");
            out.push_str("quiet-app = -a app --color never\n");
            return out;
        }

        out.push_str("\nConfiguration loaded from:\n");
        for source in loaded_from {
            out.push_str(&format!("  {}\n", source));
        }

        if let Some(defaults) = &self.config.defaults {
            out.push_str(&format!("\nActive defaults:\n  defaults = {}\n", defaults));
        }

        if !self.config.aliases.is_empty() {
            out.push_str("\nActive aliases:\n");
            for (name, value) in &self.config.aliases {
                out.push_str(&format!("  {} = {}\n", name, value));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "; comment").unwrap();
        writeln!(file, "defaults = --ts-format '%H:%M:%S' --stats").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[aliases]").unwrap();
        writeln!(file, "app = --docker -c web,worker").unwrap();
        writeln!(file, "[other]").unwrap();
        writeln!(file, "ignored = yes").unwrap();
        file.flush().unwrap();

        let config = ConfigFile::load_from_path(file.path()).unwrap();
        assert_eq!(
            config.defaults.as_deref(),
            Some("--ts-format '%H:%M:%S' --stats")
        );
        assert_eq!(config.aliases.len(), 1);
        assert_eq!(config.aliases["app"], "--docker -c web,worker");
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let err = ConfigFile::parse("[aliases]\njust words\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_missing_file() {
        assert!(ConfigFile::load_from_path(Path::new("/nonexistent/.mergetailrc")).is_err());
    }

    #[test]
    fn test_resolve_nested_alias() {
        let config = ConfigFile::parse(
            "[aliases]\nweb = -c web\ndocker-web = --docker -a web --color never\n",
        )
        .unwrap();

        assert_eq!(
            config.resolve_alias("docker-web").unwrap(),
            args(&["--docker", "-c", "web", "--color", "never"])
        );
    }

    #[test]
    fn test_same_alias_twice_is_not_a_cycle() {
        let config = ConfigFile::parse("[aliases]\nv = -v\nvv = -a v -a v\n").unwrap();
        assert_eq!(config.resolve_alias("vv").unwrap(), args(&["-v", "-v"]));
    }

    #[test]
    fn test_circular_alias_detection() {
        let config = ConfigFile::parse("[aliases]\none = -a two\ntwo = --alias=one\n").unwrap();
        let err = config.resolve_alias("one").unwrap_err();
        assert!(err.to_string().contains("Circular dependency"));
    }

    #[test]
    fn test_unknown_alias() {
        let err = ConfigFile::default().resolve_alias("nope").unwrap_err();
        assert!(err.to_string().contains("Unknown alias: nope"));
    }

    #[test]
    fn test_alias_chain_too_deep() {
        let mut content = String::from("[aliases]\n");
        for i in 0..12 {
            content.push_str(&format!("a{} = -a a{}\n", i, i + 1));
        }
        content.push_str("a12 = -v\n");
        let config = ConfigFile::parse(&content).unwrap();
        let err = config.resolve_alias("a0").unwrap_err();
        assert!(err.to_string().contains("too deep"));
    }

    #[test]
    fn test_process_args() {
        let config = ConfigFile::parse(
            "defaults = --stats\n[aliases]\napp = --docker -c web\n",
        )
        .unwrap();

        let processed = config
            .process_args(args(&["mergetail", "-a", "app", "-v"]))
            .unwrap();
        assert_eq!(
            processed,
            args(&["mergetail", "--stats", "--docker", "-c", "web", "-v"])
        );
    }

    #[test]
    fn test_process_args_without_config() {
        let processed = ConfigFile::default()
            .process_args(args(&["mergetail", "a.log"]))
            .unwrap();
        assert_eq!(processed, args(&["mergetail", "a.log"]));
    }

    #[test]
    fn test_find_project_config_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(PROJECT_CONFIG_NAME), "defaults = -v\n").unwrap();

        assert_eq!(
            ConfigFile::find_project_config_from(&nested),
            Some(dir.path().join(PROJECT_CONFIG_NAME))
        );
    }

    #[test]
    fn test_project_overlays_user() {
        let user = ConfigFile::parse("defaults = --stats\n[aliases]\na = -v\nb = -v\n").unwrap();
        let project = ConfigFile::parse("[aliases]\nb = -vv\n").unwrap();
        let merged = user.overlay(project);
        assert_eq!(merged.defaults.as_deref(), Some("--stats"));
        assert_eq!(merged.aliases["a"], "-v");
        assert_eq!(merged.aliases["b"], "-vv");
    }

    #[test]
    fn test_describe() {
        let loaded = LoadedConfig {
            config: ConfigFile::parse("defaults = --stats\n[aliases]\napp = -d\n").unwrap(),
            project_path: Some(PathBuf::from("/work/.mergetailrc")),
            user_path: None,
        };
        let text = loaded.describe();
        assert!(text.contains("Project: /work/.mergetailrc"));
        assert!(text.contains("defaults = --stats"));
        assert!(text.contains("app = -d"));

        let empty = LoadedConfig::default().describe();
        assert!(empty.contains("No configuration files found"));
    }
}
