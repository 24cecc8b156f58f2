//! Notebooks: named directories that receive committed posts.
//!
//! # Responsibility
//! - Create, load and enumerate notebooks under a root directory.
//! - Append posts and query a notebook's post index.
//!
//! # Invariants
//! - A directory is a notebook iff it contains `notebook.json`.
//! - Notebook ids are single path components (no separators, no `.`/`..`).
//! - `posts.txt` lists post file names in commit order, one per line.

mod directory;
mod post;

pub use directory::{file_manager, FsNotebookDirectory, NotebookDirectory};
pub use post::{slugify, PostRecord};

use crate::model::draft::NotebookId;
use crate::search::text::{count_tags, search_files, Tags};
use chrono::{DateTime, FixedOffset, Local};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "notebook.json";
const INDEX_FILE_NAME: &str = "posts.txt";
const DEFAULT_POST_PATH: &str = "%Y-%m-%d-%s.md";

pub type NotebookResult<T> = Result<T, NotebookError>;

/// Notebook-layer error.
#[derive(Debug)]
pub enum NotebookError {
    Io(std::io::Error),
    Config(serde_json::Error),
    /// Id is empty or not a single path component.
    InvalidId(String),
    /// No notebook with this id exists under the root.
    NotFound(NotebookId),
    /// `generate` target already exists.
    Exists(NotebookId),
    /// `post_path` template expands to something other than a file name.
    InvalidPostPath(String),
}

impl Display for NotebookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "invalid notebook config: {err}"),
            Self::InvalidId(id) => write!(f, "invalid notebook id: `{id}`"),
            Self::NotFound(id) => write!(f, "notebook not found: {id}"),
            Self::Exists(id) => write!(f, "notebook {id} already exists"),
            Self::InvalidPostPath(path) => write!(f, "invalid post path template result: `{path}`"),
        }
    }
}

impl Error for NotebookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for NotebookError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for NotebookError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}

/// Per-notebook settings stored in `notebook.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// File name template; `%Y`, `%m`, `%d` and `%s` (text slug) expand.
    #[serde(default = "default_post_path")]
    pub post_path: String,
    /// Whether posts start with a timestamp front matter block.
    #[serde(default = "default_metadata")]
    pub metadata: bool,
}

fn default_post_path() -> String {
    DEFAULT_POST_PATH.to_string()
}

fn default_metadata() -> bool {
    true
}

impl NotebookConfig {
    pub fn named(id: &str) -> Self {
        Self {
            name: id.to_string(),
            description: String::new(),
            post_path: default_post_path(),
            metadata: true,
        }
    }
}

/// A loaded notebook directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    pub id: NotebookId,
    pub path: PathBuf,
}

impl Notebook {
    /// Loads a notebook from any directory; `None` when it is not a notebook.
    pub fn load_from_path(path: &Path) -> Option<Self> {
        if !path.join(CONFIG_FILE_NAME).is_file() {
            return None;
        }
        let id = path.file_name()?.to_str()?.to_string();
        Some(Self {
            id,
            path: path.to_path_buf(),
        })
    }

    /// Loads notebook `id` under `root`.
    pub fn load(root: &Path, id: &str) -> NotebookResult<Self> {
        let id = validate_id(id)?;
        Self::load_from_path(&root.join(id)).ok_or_else(|| NotebookError::NotFound(id.to_string()))
    }

    /// Creates a new notebook with default settings. Fails if it exists.
    pub fn generate(root: &Path, id: &str) -> NotebookResult<Self> {
        let id = validate_id(id)?;
        let path = root.join(id);
        if path.exists() {
            return Err(NotebookError::Exists(id.to_string()));
        }
        fs::create_dir_all(&path)?;

        let config = NotebookConfig::named(id);
        fs::write(
            path.join(CONFIG_FILE_NAME),
            serde_json::to_string_pretty(&config)?,
        )?;
        info!("event=notebook_generate module=notebook status=ok notebook={id}");

        Ok(Self {
            id: id.to_string(),
            path,
        })
    }

    pub fn read_config(&self) -> NotebookResult<NotebookConfig> {
        let raw = fs::read_to_string(self.path.join(CONFIG_FILE_NAME))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_config(&self, config: &NotebookConfig) -> NotebookResult<()> {
        fs::write(
            self.path.join(CONFIG_FILE_NAME),
            serde_json::to_string_pretty(config)?,
        )?;
        Ok(())
    }

    /// Writes `text` as a new post stamped with the local time.
    pub fn post(&self, text: &str) -> NotebookResult<PostRecord> {
        self.post_at(text, Local::now().fixed_offset())
    }

    /// Writes `text` as a new post stamped with `now`.
    ///
    /// The post either fully lands (file plus index line) or leaves no trace.
    pub fn post_at(&self, text: &str, now: DateTime<FixedOffset>) -> NotebookResult<PostRecord> {
        let config = self.read_config()?;
        post::write_post(self, &config, text, now)
    }

    /// Post file names in commit order. A notebook without posts yields `[]`.
    pub fn posts(&self) -> NotebookResult<Vec<PathBuf>> {
        let file = match fs::File::open(self.index_path()) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut posts = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                posts.push(PathBuf::from(line));
            }
        }
        Ok(posts)
    }

    /// Absolute paths of all indexed posts.
    pub fn post_paths(&self) -> NotebookResult<Vec<PathBuf>> {
        Ok(self
            .posts()?
            .into_iter()
            .map(|post| self.path.join(post))
            .collect())
    }

    /// Posts whose contents contain `query`.
    pub fn search(&self, query: &str) -> NotebookResult<Vec<PathBuf>> {
        Ok(search_files(&self.post_paths()?, query))
    }

    /// Hashtag occurrence counts across all posts.
    pub fn tags(&self) -> NotebookResult<Tags> {
        Ok(count_tags(&self.post_paths()?))
    }

    fn index_path(&self) -> PathBuf {
        self.path.join(INDEX_FILE_NAME)
    }
}

/// Lists notebooks under `root`, sorted by id. A missing root yields `[]`.
pub fn list_notebooks(root: &Path) -> NotebookResult<Vec<Notebook>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut notebooks = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| Notebook::load_from_path(&entry.path()))
        .collect::<Vec<_>>();
    notebooks.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(notebooks)
}

/// Returns the trimmed id when it names a single path component.
pub fn validate_id(id: &str) -> NotebookResult<&str> {
    let trimmed = id.trim();
    let valid = !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !trimmed.contains(['/', '\\'])
        && !trimmed.contains('\0');
    if valid {
        Ok(trimmed)
    } else {
        Err(NotebookError::InvalidId(id.to_string()))
    }
}
