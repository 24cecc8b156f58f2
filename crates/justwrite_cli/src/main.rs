//! `jw`: command-line micro-journaling over JustWrite notebooks.

mod editor;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use justwrite_core::db::open_db;
use justwrite_core::repo::draft_repo::{clear_draft, draft_write_count, read_draft};
use justwrite_core::{
    default_log_level, init_logging, list_notebooks, AppConfig, Notebook, NotebookCommitService,
    NotebookError,
};
use std::io::{IsTerminal, Read};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "jw", version)]
#[command(about = "A micro-journaling tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Make a new notebook
    New { notebook: String },
    /// Write a post
    Post {
        notebook: String,
        /// Post text; read from stdin or $EDITOR when omitted
        #[arg(long)]
        text: Option<String>,
    },
    /// List existing notebooks
    List,
    /// List posts containing QUERY
    Search { notebook: String, query: String },
    /// List hashtags in a notebook
    Tags { notebook: String },
    /// Edit the NUM-th most recent post (0 = latest)
    Edit {
        notebook: String,
        #[arg(default_value_t = 0)]
        num: usize,
    },
    /// Inspect the draft autosaved by the desktop app
    Draft {
        #[command(subcommand)]
        op: DraftOp,
    },
}

#[derive(Subcommand, Debug)]
enum DraftOp {
    /// Print the autosaved draft
    Show,
    /// Discard the autosaved draft
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to resolve configuration")?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(default_log_level(), &log_dir.display().to_string())
            .context("failed to initialize logging")?;
    }

    match cli.command {
        Commands::New { notebook } => {
            match Notebook::generate(&config.root, &notebook) {
                Err(NotebookError::Exists(id)) => bail!("notebook {id} already exists"),
                other => other?,
            };
            println!("Created notebook {notebook}");
            Ok(())
        }
        Commands::Post { notebook, text } => post(&config.root, &notebook, text),
        Commands::List => {
            for notebook in list_notebooks(&config.root)? {
                println!("{}", notebook.id);
            }
            Ok(())
        }
        Commands::Search { notebook, query } => {
            for path in open_notebook(&config.root, &notebook)?.search(&query)? {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Tags { notebook } => {
            for (tag, count) in open_notebook(&config.root, &notebook)?.tags()? {
                println!("#{tag}: {count}");
            }
            Ok(())
        }
        Commands::Edit { notebook, num } => {
            let notebook = open_notebook(&config.root, &notebook)?;
            let posts = notebook.posts()?;
            let Some(post) = nth_recent(&posts, num) else {
                bail!("no such post: {num} (notebook has {} posts)", posts.len());
            };
            editor::edit_file(&notebook.path.join(post))?;
            Ok(())
        }
        Commands::Draft { op } => draft(&config.state_db, op),
    }
}

fn open_notebook(root: &Path, id: &str) -> Result<Notebook> {
    Notebook::load(root, id).with_context(|| {
        format!("could not open notebook {id}\nUse `jw new {id}` to create a new one")
    })
}

fn post(root: &Path, notebook: &str, text: Option<String>) -> Result<()> {
    open_notebook(root, notebook)?;
    let text = match text {
        Some(text) => text,
        None if !std::io::stdin().is_terminal() => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read post from stdin")?;
            buffer
        }
        None => editor::compose()?,
    };

    match NotebookCommitService::new(root).commit_blocking(notebook, &text)? {
        Some(record) => {
            println!("Wrote post to {}", record.path.display());
            Ok(())
        }
        None => bail!("nothing to save"),
    }
}

fn draft(state_db: &Path, op: DraftOp) -> Result<()> {
    let conn = open_db(state_db)
        .with_context(|| format!("failed to open state database {}", state_db.display()))?;
    match op {
        DraftOp::Show => {
            let draft = read_draft(&conn)?;
            if draft.is_empty() {
                println!("(no draft)");
            } else {
                println!("notebook: {}", draft.notebook_id);
                println!("autosaves: {}", draft_write_count(&conn)?);
                println!("{}", draft.text);
            }
        }
        DraftOp::Clear => {
            clear_draft(&conn)?;
            println!("Draft cleared");
        }
    }
    Ok(())
}

/// `num`-th entry counting back from the newest.
fn nth_recent<T>(posts: &[T], num: usize) -> Option<&T> {
    posts.iter().rev().nth(num)
}
