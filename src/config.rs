//! Engine settings and the files they are read from.
//!
//! Lookup order for [`Settings::read_default_config`]:
//! `.radiation.toml`, `.radiation.cfg`, then `[tool.radiation]` in
//! `pyproject.toml`, then built-in defaults. A settings file may use either a
//! `[radiation]` or a `[settings]` section.
//!
//! In `.cfg` files list values (`include`, `exclude`, `rules`) go one per
//! line on indented continuation lines; `rules` also accepts commas.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::operators::{self, Registry};
use crate::report::ScorePolicy;

pub const CONFIG_FILE: &str = ".radiation.toml";
pub const CFG_FILE: &str = ".radiation.cfg";
pub const PYPROJECT_FILE: &str = "pyproject.toml";

/// Fully resolved settings consumed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Files, directories or glob patterns to mutate, relative to `project_root`.
    pub include: Vec<String>,
    /// Glob patterns (or paths) never mutated.
    pub exclude: Vec<String>,
    pub project_root: PathBuf,
    pub run_command: String,
    /// Never mutated.
    pub tests_dir: String,
    /// Per-mutant limit in seconds; `None` waits forever.
    pub tests_timeout: Option<f64>,
    /// Worker pool size; defaults to available parallelism.
    pub workers: Option<usize>,
    pub score_policy: ScorePolicy,
    pub rules: Vec<String>,
    pub in_place: bool,
    pub baseline: bool,
    pub max_output_bytes: usize,
}

fn default_tests_dir() -> String {
    "tests".to_string()
}

fn default_run_command() -> String {
    "pytest".to_string()
}

fn default_rules() -> Vec<String> {
    operators::DEFAULT_RULES.iter().map(|s| s.to_string()).collect()
}

const DEFAULT_MAX_OUTPUT_BYTES: usize = 4000;

impl Settings {
    /// Defaults used when no configuration file is present.
    pub fn defaults(project_root: &Path) -> Self {
        Self {
            include: vec![".".to_string()],
            exclude: Vec::new(),
            project_root: project_root.to_path_buf(),
            run_command: default_run_command(),
            tests_dir: default_tests_dir(),
            tests_timeout: None,
            workers: None,
            score_policy: ScorePolicy::default(),
            rules: default_rules(),
            in_place: false,
            baseline: true,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Fail fast on settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.include.iter().all(|i| i.trim().is_empty()) {
            return Err(EngineError::config("'include' must list at least one path or pattern"));
        }
        if self.run_command.trim().is_empty() {
            return Err(EngineError::config("'run_command' must not be empty"));
        }
        if let Some(t) = self.tests_timeout {
            if !(t.is_finite() && t > 0.0) {
                return Err(EngineError::config(format!(
                    "'tests_timeout' must be a positive number of seconds, got {}",
                    t
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(EngineError::config("'workers' must be at least 1"));
        }
        if !self.project_root.is_dir() {
            return Err(EngineError::config(format!(
                "project root '{}' is not a directory",
                self.project_root.display()
            )));
        }
        self.registry()?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.tests_timeout.map(Duration::from_secs_f64)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn registry(&self) -> Result<Registry> {
        let registry = Registry::from_names(&self.rules).map_err(EngineError::config)?;
        if registry.is_empty() {
            return Err(EngineError::config("'rules' must enable at least one mutation rule"));
        }
        Ok(registry)
    }

    /// Read an explicit configuration file.
    pub fn read_config(path: &Path) -> Result<Self> {
        let section = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                let file = read_toml(path)?;
                file.radiation.or(file.settings)
            }
            Some("cfg") => read_cfg(path)?,
            _ => {
                return Err(EngineError::config(
                    "Unrecognized config file format (supported: .toml, .cfg)",
                ));
            }
        };
        let section = section.ok_or_else(|| {
            EngineError::config(
                "Cannot find expected sections in config file (expected: [radiation] or [settings])",
            )
        })?;
        Ok(section.resolve(config_dir(path)))
    }

    /// Find configuration in `project_dir`, falling back to defaults.
    pub fn read_default_config(project_dir: &Path) -> Result<Self> {
        let own = project_dir.join(CONFIG_FILE);
        if own.is_file() {
            tracing::debug!("Reading settings from {}", own.display());
            return Self::read_config(&own);
        }

        let cfg = project_dir.join(CFG_FILE);
        if cfg.is_file() {
            tracing::debug!("Reading settings from {}", cfg.display());
            return Self::read_config(&cfg);
        }

        let pyproject = project_dir.join(PYPROJECT_FILE);
        if pyproject.is_file() {
            let file = read_toml(&pyproject)?;
            if let Some(section) = file.tool.and_then(|t| t.radiation) {
                tracing::debug!("Reading settings from {} [tool.radiation]", pyproject.display());
                return Ok(section.resolve(project_dir.to_path_buf()));
            }
        }

        tracing::debug!("No configuration found in {}, using defaults", project_dir.display());
        Ok(Self::defaults(project_dir))
    }
}

fn config_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        EngineError::config(format!("Failed to read config file '{}': {}", path.display(), e))
    })
}

fn read_toml(path: &Path) -> Result<ConfigFile> {
    let content = read_file(path)?;
    toml::from_str(&content).map_err(|e| {
        EngineError::config(format!("Failed to parse config file '{}': {}", path.display(), e))
    })
}

/// The `[radiation]` (or else `[settings]`) section of an INI-style file.
fn read_cfg(path: &Path) -> Result<Option<FileSettings>> {
    let content = read_file(path)?;
    let options = ini::ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        enabled_indented_mutiline_value: true,
        ..Default::default()
    };
    let file = ini::Ini::load_from_str_opt(&content, options).map_err(|e| {
        EngineError::config(format!("Failed to parse config file '{}': {}", path.display(), e))
    })?;
    let Some(section) = ["radiation", "settings"]
        .into_iter()
        .find_map(|name| file.section(Some(name)))
    else {
        return Ok(None);
    };
    FileSettings::from_properties(section).map(Some).map_err(|e| {
        EngineError::config(format!("Invalid config file '{}': {}", path.display(), e))
    })
}

fn split_lines(value: &str) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn split_names(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T>(key: &str, value: &str) -> std::result::Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| format!("'{}' has invalid value '{}': {}", key, value, e))
}

fn parse_bool(key: &str, value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(format!("'{}' expects a boolean, got '{}'", key, value)),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    radiation: Option<FileSettings>,
    settings: Option<FileSettings>,
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    radiation: Option<FileSettings>,
}

/// A single string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    include: Option<StringList>,
    exclude: Option<StringList>,
    run_command: Option<String>,
    tests_dir: Option<String>,
    tests_timeout: Option<f64>,
    workers: Option<usize>,
    score_policy: Option<ScorePolicy>,
    rules: Option<Vec<String>>,
    in_place: Option<bool>,
    baseline: Option<bool>,
    max_output_bytes: Option<usize>,
}

impl FileSettings {
    fn from_properties(section: &ini::Properties) -> std::result::Result<Self, String> {
        let mut settings = Self::default();
        for (key, value) in section.iter() {
            let value = value.trim();
            match key {
                "include" => settings.include = Some(StringList::Many(split_lines(value))),
                "exclude" => settings.exclude = Some(StringList::Many(split_lines(value))),
                "run_command" => settings.run_command = Some(value.to_string()),
                "tests_dir" => settings.tests_dir = Some(value.to_string()),
                "tests_timeout" => settings.tests_timeout = Some(parse_number(key, value)?),
                "workers" => settings.workers = Some(parse_number(key, value)?),
                "score_policy" => settings.score_policy = Some(value.parse()?),
                "rules" => settings.rules = Some(split_names(value)),
                "in_place" => settings.in_place = Some(parse_bool(key, value)?),
                "baseline" => settings.baseline = Some(parse_bool(key, value)?),
                "max_output_bytes" => {
                    settings.max_output_bytes = Some(parse_number(key, value)?)
                }
                other => return Err(format!("unknown key '{}'", other)),
            }
        }
        Ok(settings)
    }

    fn resolve(self, project_root: PathBuf) -> Settings {
        let defaults = Settings::defaults(&project_root);
        Settings {
            include: self.include.map_or(defaults.include, StringList::into_vec),
            exclude: self.exclude.map_or(defaults.exclude, StringList::into_vec),
            project_root,
            run_command: self.run_command.unwrap_or(defaults.run_command),
            tests_dir: self.tests_dir.unwrap_or(defaults.tests_dir),
            tests_timeout: self.tests_timeout,
            workers: self.workers,
            score_policy: self.score_policy.unwrap_or(defaults.score_policy),
            rules: self.rules.unwrap_or(defaults.rules),
            in_place: self.in_place.unwrap_or(defaults.in_place),
            baseline: self.baseline.unwrap_or(defaults.baseline),
            max_output_bytes: self.max_output_bytes.unwrap_or(defaults.max_output_bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_accepts_string_or_list() {
        let one: FileSettings = toml::from_str(r#"include = ".""#).unwrap();
        assert_eq!(one.include.unwrap().into_vec(), vec!["."]);
        let many: FileSettings = toml::from_str(r#"include = ["*.py", "mydir/"]"#).unwrap();
        assert_eq!(many.include.unwrap().into_vec(), vec!["*.py", "mydir/"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: std::result::Result<FileSettings, _> = toml::from_str(r#"inclde = ".""#);
        assert!(parsed.is_err());
    }

    #[test]
    fn cfg_lists_split_on_lines_and_commas() {
        assert_eq!(split_lines("\n*.py\n  mydir/\n"), vec!["*.py", "mydir/"]);
        assert_eq!(split_names("arithmetic, logical\nboolean"), vec!["arithmetic", "logical", "boolean"]);
    }

    #[test]
    fn cfg_booleans_follow_ini_conventions() {
        assert_eq!(parse_bool("in_place", "Yes"), Ok(true));
        assert_eq!(parse_bool("in_place", "off"), Ok(false));
        assert!(parse_bool("in_place", "maybe").is_err());
    }

    #[test]
    fn config_dir_of_bare_file_name_is_cwd() {
        assert_eq!(config_dir(Path::new("x.toml")), PathBuf::from("."));
        assert_eq!(config_dir(Path::new("/a/b/x.toml")), PathBuf::from("/a/b"));
    }
}
