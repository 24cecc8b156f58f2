//! `$EDITOR` integration for composing and revising posts.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use uuid::Uuid;

const DEFAULT_EDITOR: &str = "vi";

/// Splits an `$EDITOR` value into program and leading arguments.
fn editor_command(raw: Option<&str>) -> (String, Vec<String>) {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty());
    let mut parts = raw.unwrap_or(DEFAULT_EDITOR).split_whitespace();
    let program = parts.next().unwrap_or(DEFAULT_EDITOR).to_string();
    (program, parts.map(str::to_string).collect())
}

/// Opens `path` in the user's editor and returns the saved contents.
pub fn edit_file(path: &Path) -> Result<String> {
    let configured = std::env::var("EDITOR").ok();
    let (program, args) = editor_command(configured.as_deref());

    let status = Command::new(&program)
        .args(&args)
        .arg(path)
        .status()
        .with_context(|| {
            format!("failed to launch `{program}`; set EDITOR or install {DEFAULT_EDITOR}")
        })?;
    if !status.success() {
        bail!("editor `{program}` exited with {status}");
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Composes new text in a scratch file that is removed afterwards.
pub fn compose() -> Result<String> {
    let path = scratch_path();
    let result = edit_file(&path);
    let _ = fs::remove_file(&path);
    result
}

fn scratch_path() -> PathBuf {
    std::env::temp_dir().join(format!("jw-{}.md", Uuid::new_v4().simple()))
}
