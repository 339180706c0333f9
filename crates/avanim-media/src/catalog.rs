//! Named expressions mapped to canned driving videos.

use avanim_models::Expression;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Expressions available out of the box.
pub const DEFAULT_EXPRESSIONS: [&str; 4] = ["smile", "angry", "surprised", "sad"];

/// Mapping from expression name to driving video path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionCatalog {
    entries: BTreeMap<String, PathBuf>,
}

impl ExpressionCatalog {
    /// The default expressions, each at `<dir>/<name>.mp4`.
    pub fn default_in(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            entries: DEFAULT_EXPRESSIONS
                .iter()
                .map(|name| (name.to_string(), dir.join(format!("{name}.mp4"))))
                .collect(),
        }
    }

    pub fn from_entries<I, S, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, path)| (name.into(), path.into()))
                .collect(),
        }
    }

    /// Parse `name=path` pairs separated by commas.
    ///
    /// Relative paths resolve against `base_dir`.
    pub fn parse(list: &str, base_dir: &Path) -> MediaResult<Self> {
        let mut entries = BTreeMap::new();
        for pair in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, path) = pair.split_once('=').ok_or_else(|| {
                MediaError::internal(format!("expression entry `{pair}` is not name=path"))
            })?;
            let name = name.trim();
            let path = Path::new(path.trim());
            if name.is_empty() || path.as_os_str().is_empty() {
                return Err(MediaError::internal(format!(
                    "expression entry `{pair}` is incomplete"
                )));
            }
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                base_dir.join(path)
            };
            entries.insert(name.to_string(), path);
        }
        Ok(Self { entries })
    }

    /// Driving video for `name`, without touching the filesystem.
    pub fn lookup(&self, name: &str) -> MediaResult<&Path> {
        self.entries
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| MediaError::UnknownExpression(name.to_string()))
    }

    /// Driving video for `name`, checked to exist on disk.
    pub fn resolve(&self, name: &str) -> MediaResult<&Path> {
        let path = self.lookup(name)?;
        if !path.exists() {
            return Err(MediaError::DrivingFileMissing(path.to_path_buf()));
        }
        Ok(path)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    /// Names whose driving video is absent.
    pub fn missing_files(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, path)| !path.exists())
            .map(|(name, _)| name)
            .collect()
    }

    /// Store records for every entry, ordered by name.
    pub fn records(&self) -> Vec<Expression> {
        self.iter()
            .map(|(name, path)| Expression::new(name, path.to_string_lossy()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ExpressionCatalog {
    fn default() -> Self {
        Self::default_in("expressions")
    }
}
