//! `.env` discovery, loading and in-place value updates.
//!
//! Loading never overrides a variable already present in the process
//! environment, so the effective precedence is flag > environment > file.

use crate::error::{NqError, NqResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const ENV_FILE_NAME: &str = ".env";

/// Load the first usable `.env` file and return its path.
///
/// With `env_file` set the file must exist and load cleanly. Otherwise
/// `./.env` then `~/.env` are tried and anything missing or unreadable is
/// skipped.
pub fn load_environment(env_file: Option<&str>) -> NqResult<Option<PathBuf>> {
    let explicit = env_file.filter(|p| !p.trim().is_empty());
    let candidates = match explicit {
        Some(path) => vec![expand_path(path)?],
        None => default_candidates(),
    };

    for candidate in candidates {
        let meta = match fs::metadata(&candidate) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) if explicit.is_some() => {
                return Err(NqError::io(
                    format!("failed to stat env file {:?}", candidate),
                    e,
                ))
            }
            Err(_) => continue,
        };

        if meta.is_dir() {
            if explicit.is_some() {
                return Err(NqError::EnvFileIsDirectory(candidate));
            }
            continue;
        }

        match dotenvy::from_path(&candidate) {
            Ok(()) => {
                log::debug!("loaded environment from {}", candidate.display());
                return Ok(Some(candidate));
            }
            Err(source) if explicit.is_some() => {
                return Err(NqError::EnvFileLoad {
                    path: candidate,
                    source,
                })
            }
            Err(e) => {
                log::debug!("skipping {}: {}", candidate.display(), e);
                continue;
            }
        }
    }

    match explicit {
        Some(path) => Err(NqError::EnvFileNotFound(PathBuf::from(path))),
        None => Ok(None),
    }
}

fn default_candidates() -> Vec<PathBuf> {
    std::env::current_dir()
        .ok()
        .into_iter()
        .chain(dirs::home_dir())
        .map(|dir| dir.join(ENV_FILE_NAME))
        .collect()
}

/// Expand a leading `~` and make the path absolute.
pub fn expand_path(path: &str) -> NqResult<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return Err(NqError::Config("empty path".to_string()));
    }

    let expanded = match path.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir().ok_or(NqError::NoHomeDirectory)?;
            home.join(rest.trim_start_matches(['/', '\\']))
        }
        None => PathBuf::from(path),
    };

    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| NqError::io("determine current working directory", e))?;
    Ok(cwd.join(expanded))
}

/// File that `login` writes to: the explicit `--env-file`, else `./.env`.
pub fn resolve_env_file_for_write(env_file: Option<&str>) -> NqResult<PathBuf> {
    match env_file.filter(|p| !p.trim().is_empty()) {
        Some(path) => expand_path(path),
        None => std::env::current_dir()
            .map(|cwd| cwd.join(ENV_FILE_NAME))
            .map_err(|e| NqError::io("determine current working directory", e)),
    }
}

/// Update `key` in place or append it, always as a double-quoted value.
///
/// The file is rewritten through a sibling temporary file and ends up with
/// mode 0600 on Unix.
pub fn write_env_value(path: &Path, key: &str, value: &str) -> NqResult<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(NqError::EmptyEnvKey);
    }
    if path.as_os_str().is_empty() {
        return Err(NqError::Config("env file path cannot be empty".to_string()));
    }

    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(NqError::io(format!("read env file {:?}", path), e)),
    };

    let assignment = format!("{}={}", key, quote(value));
    let mut updated = false;
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| match line.split_once('=') {
            Some((current, _)) if current.trim() == key => {
                updated = true;
                assignment.clone()
            }
            _ => line.to_string(),
        })
        .collect();
    if !updated {
        lines.push(assignment);
    }

    let mut content = lines.join("\n");
    content.push('\n');

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .map_err(|e| NqError::io(format!("create env dir {:?}", dir), e))?;

    // tempfile creates its files with mode 0600
    let mut tmp = tempfile::Builder::new()
        .prefix(".env-")
        .tempfile_in(&dir)
        .map_err(|e| NqError::io(format!("write env file {:?}", path), e))?;
    tmp.write_all(content.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| NqError::io(format!("write env file {:?}", path), e))?;
    tmp.persist(path).map_err(|source| NqError::PersistEnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Double-quote `value`, escaping what a dotenv parser would interpret.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '$' => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
