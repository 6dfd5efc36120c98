//! Environment bootstrap
//!
//! The env file is parsed without touching the process environment. The
//! resulting [`Environment`] is handed explicitly to whoever needs it
//! (consent overrides, the workload's child process).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Environment bootstrap errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error(
        "Environment file {path} not found; create it (for example from a template) and restart"
    )]
    FileMissing { path: PathBuf },

    #[error("Failed to parse environment file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error(
        "Incomplete provider configuration for {}: each provider needs both NAME_BASE_URL and NAME_KEY",
        .names.join(", ")
    )]
    IncompleteProviders { names: Vec<String> },
}

pub type EnvResult<T> = Result<T, EnvError>;

/// The process environment as it was before the env file was read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }))
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Snapshot overlaid with env file entries (file wins)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
    file_keys: BTreeSet<String>,
}

impl Environment {
    pub fn new(snapshot: &EnvSnapshot, file_entries: &[(String, String)]) -> Self {
        let mut vars = snapshot.vars.clone();
        let mut file_keys = BTreeSet::new();
        for (key, value) in file_entries {
            vars.insert(key.clone(), value.clone());
            file_keys.insert(key.clone());
        }
        Self { vars, file_keys }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Entries that came from the env file
    pub fn file_vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.file_keys
            .iter()
            .filter_map(|k| self.vars.get(k).map(|v| (k.as_str(), v.as_str())))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a dotenv file, returning its entries in file order
pub fn load_env_file(path: &Path) -> EnvResult<Vec<(String, String)>> {
    if !path.exists() {
        return Err(EnvError::FileMissing {
            path: path.to_path_buf(),
        });
    }

    let parse_err = |source| EnvError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let entries = dotenvy::from_path_iter(path)
        .map_err(parse_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(parse_err)?;

    info!(path = %path.display(), count = entries.len(), "Environment file loaded");
    Ok(entries)
}

/// Check that every provider introduced by the env file has both a
/// `{NAME}_BASE_URL` and a `{NAME}_KEY` entry.
///
/// Keys already present in `snapshot` are ignored so unrelated variables
/// inherited from the shell (e.g. `GPG_KEY`) don't trip the check. The
/// provider name is the key's prefix up to its first `_`.
///
/// Returns the complete provider names, sorted.
pub fn scan_providers(
    file_entries: &[(String, String)],
    snapshot: &EnvSnapshot,
) -> EnvResult<Vec<String>> {
    #[derive(Default)]
    struct Pair {
        url: bool,
        key: bool,
    }

    let mut providers: BTreeMap<&str, Pair> = BTreeMap::new();

    for (key, _) in file_entries {
        if snapshot.contains(key) {
            continue;
        }

        let is_url = key.ends_with("_BASE_URL");
        let is_key = !is_url && key.ends_with("_KEY");
        if !is_url && !is_key {
            continue;
        }

        let name = key.split('_').next().unwrap_or_default();
        if name.is_empty() {
            continue;
        }

        let pair = providers.entry(name).or_default();
        if is_url {
            pair.url = true;
        } else {
            pair.key = true;
        }
    }

    let incomplete: Vec<String> = providers
        .iter()
        .filter(|(_, pair)| !(pair.url && pair.key))
        .map(|(name, _)| name.to_string())
        .collect();

    if !incomplete.is_empty() {
        return Err(EnvError::IncompleteProviders { names: incomplete });
    }

    let names: Vec<String> = providers.into_keys().map(str::to_string).collect();
    debug!(providers = ?names, "Provider configuration complete");
    Ok(names)
}
