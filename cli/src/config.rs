//! Persistent defaults: endpoints, headers and basic credentials.
//!
//! The store is a single JSON file. It is looked up in the working
//! directory, the enclosing git repository, and the home directory, in that
//! order; `APICALL_CONFIG` names a file directly and skips the search.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use apicall_core::{BasicAuth, Headers};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = ".apicall.json";
pub const CONFIG_ENV: &str = "APICALL_CONFIG";

pub const DEFAULT_ENDPOINTS: [&str; 4] = [
    "http://localhost:8000",
    "http://localhost:8080",
    "http://localhost:3000",
    "http://localhost:9292",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub headers: Headers,
    pub basic: Option<BasicAuth>,
    pub endpoints: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            headers: Headers::new(),
            basic: None,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl Config {
    /// Add a header, replacing any header whose name differs only by case.
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name, value);
    }

    pub fn remove_headers<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.headers.remove(name.as_ref());
        }
    }
}

/// Where to look for the configuration file.
#[derive(Debug, Clone)]
pub struct Locator {
    pub base_dir: PathBuf,
    pub home: Option<PathBuf>,
    pub explicit: Option<PathBuf>,
}

impl Locator {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            base_dir: env::current_dir().context("failed to read the working directory")?,
            home: env::var_os("HOME").map(PathBuf::from),
            explicit: env::var_os(CONFIG_ENV).map(PathBuf::from),
        })
    }

    /// Candidate files, most specific first.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = vec![self.base_dir.join(CONFIG_FILE_NAME)];
        if let Some(root) = find_git_root(&self.base_dir) {
            candidates.push(root.join(CONFIG_FILE_NAME));
        }
        if let Some(home) = &self.home {
            candidates.push(home.join(CONFIG_FILE_NAME));
            candidates.push(home.join(".config").join("apicall.json"));
        }
        candidates
    }

    pub fn search(&self) -> Option<PathBuf> {
        self.candidates().into_iter().find(|path| {
            debug!(path = %path.display(), "looking for config file");
            path.is_file()
        })
    }

    /// Where a new file is written when none exists yet.
    pub fn default_location(&self) -> PathBuf {
        find_git_root(&self.base_dir)
            .or_else(|| self.home.clone())
            .unwrap_or_else(|| self.base_dir.clone())
            .join(CONFIG_FILE_NAME)
    }
}

/// Nearest ancestor of `base` (inclusive) that holds a `.git` entry.
pub fn find_git_root(base: &Path) -> Option<PathBuf> {
    base.ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

pub fn load(path: &Path) -> anyhow::Result<Config> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Load the configuration the locator points at, falling back to defaults.
/// Returns the path later writes should go to.
pub fn load_or_default(locator: &Locator) -> anyhow::Result<(PathBuf, Config)> {
    let found = match &locator.explicit {
        Some(path) if path.exists() => Some(path.clone()),
        Some(path) => return Ok((path.clone(), Config::default())),
        None => locator.search(),
    };

    match found {
        Some(path) => {
            let config = load(&path)?;
            info!(path = %path.display(), "loaded config");
            Ok((path, config))
        }
        None => {
            let path = locator.default_location();
            debug!(path = %path.display(), "no config file, using defaults");
            Ok((path, Config::default()))
        }
    }
}

pub fn save(path: &Path, config: &Config) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(config)?;
    text.push('\n');
    fs::write(path, text)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    info!(path = %path.display(), "saved config");
    Ok(())
}
