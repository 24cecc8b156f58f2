//! Post file naming and all-or-nothing post writes.

use super::{Notebook, NotebookConfig, NotebookError, NotebookResult};
use crate::logging::redacted;
use crate::model::draft::NotebookId;
use chrono::{DateTime, FixedOffset};
use log::{error, info};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SLUG_SOURCE_CHARS: usize = 22;
const EMPTY_SLUG: &str = "post";
const MAX_NAME_SUFFIX: u32 = 1000;

/// One committed post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub notebook_id: NotebookId,
    /// Absolute path of the written post file.
    pub path: PathBuf,
    /// File name as recorded in the notebook index.
    pub file_name: String,
    pub committed_at: DateTime<FixedOffset>,
}

/// Builds a file-name-safe slug from the start of `text`.
///
/// Non-alphanumeric runs collapse into one `-`; leading and trailing dashes
/// are dropped. Falls back to `post` when nothing usable remains.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for ch in text.chars().take(SLUG_SOURCE_CHARS) {
        if ch.is_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}

fn expand_post_path(template: &str, text: &str, now: &DateTime<FixedOffset>) -> NotebookResult<String> {
    let name = template
        .replace("%Y", &now.format("%Y").to_string())
        .replace("%m", &now.format("%m").to_string())
        .replace("%d", &now.format("%d").to_string())
        .replace("%s", &slugify(text));

    let is_single_component = Path::new(&name)
        .file_name()
        .is_some_and(|file_name| file_name == name.as_str());
    if name.trim().is_empty() || !is_single_component || name.starts_with('.') {
        return Err(NotebookError::InvalidPostPath(name));
    }
    Ok(name)
}

fn render_post(config: &NotebookConfig, text: &str, now: &DateTime<FixedOffset>) -> String {
    if config.metadata {
        format!("---\ntimestamp: {}\n---\n{text}", now.to_rfc3339())
    } else {
        text.to_string()
    }
}

pub(super) fn write_post(
    notebook: &Notebook,
    config: &NotebookConfig,
    text: &str,
    now: DateTime<FixedOffset>,
) -> NotebookResult<PostRecord> {
    let base_name = expand_post_path(&config.post_path, text, &now)?;
    let body = render_post(config, text, &now);

    let temp_path = notebook.path.join(format!(".post-{}.tmp", Uuid::new_v4()));
    let result = write_temp(&temp_path, body.as_bytes())
        .map_err(NotebookError::from)
        .and_then(|()| link_unique(&notebook.path, &temp_path, &base_name));
    // The temp name is never indexed; only the hard link survives.
    let _ = fs::remove_file(&temp_path);
    let (path, file_name) = result?;

    if let Err(err) = append_index(&notebook.index_path(), &file_name) {
        error!(
            "event=post_write module=notebook status=error notebook={} error_code=index_append_failed error={}",
            notebook.id, err
        );
        let _ = fs::remove_file(&path);
        return Err(err.into());
    }

    info!(
        "event=post_write module=notebook status=ok notebook={} file={} text={}",
        notebook.id,
        file_name,
        redacted(text)
    );
    Ok(PostRecord {
        notebook_id: notebook.id.clone(),
        path,
        file_name,
        committed_at: now,
    })
}

fn write_temp(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Links `temp` under `base_name`, or `base_name.N` when taken.
fn link_unique(dir: &Path, temp: &Path, base_name: &str) -> NotebookResult<(PathBuf, String)> {
    for attempt in 0..MAX_NAME_SUFFIX {
        let file_name = if attempt == 0 {
            base_name.to_string()
        } else {
            format!("{base_name}.{attempt}")
        };
        let target = dir.join(&file_name);
        match fs::hard_link(temp, &target) {
            Ok(()) => return Ok((target, file_name)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(NotebookError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free post name for `{base_name}`"),
    )))
}

fn append_index(index: &Path, file_name: &str) -> std::io::Result<()> {
    append_index_with(index, file_name, |file, line| {
        file.write_all(line)?;
        file.sync_all()
    })
}

/// Appends one index line with `write`; on failure the index is truncated
/// back to its previous length so no partial line survives.
fn append_index_with<F>(index: &Path, file_name: &str, write: F) -> std::io::Result<()>
where
    F: FnOnce(&mut File, &[u8]) -> std::io::Result<()>,
{
    let mut file = OpenOptions::new().create(true).append(true).open(index)?;
    let previous_len = file.metadata()?.len();
    let result = write(&mut file, format!("{file_name}\n").as_bytes());
    if result.is_err() {
        if let Err(err) = file.set_len(previous_len).and_then(|()| file.sync_all()) {
            error!(
                "event=index_rollback module=notebook status=error index={} error={}",
                index.display(),
                err
            );
        }
    }
    result
}
