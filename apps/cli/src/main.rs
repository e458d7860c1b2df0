use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, warn};
use quillpad_core::{
    ActiveFileWatcher, DialogProvider, Driver, EditSession, LocalFileAuthority, OpenMode,
    SaveFilter, SessionConfig, SessionEvent,
};
use quillpad_project::TreeRow;
use quillpad_settings::{Preferences, PreferencesStore};

#[derive(Parser)]
#[command(
    name = "quillpad-cli",
    about = "Drive a QuillPad editing session from the command line",
    author,
    version
)]
struct Cli {
    /// 偏好設定檔路徑；略過時使用預設值。 / Preferences file (defaults are used when omitted).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 列出專案樹。 / Print the project tree below a root folder.
    Tree(TreeArgs),
    /// 顯示檔案的儲存狀態。 / Show whether an edited buffer differs from disk.
    Status(StatusArgs),
    /// 編輯並儲存檔案。 / Replace a buffer's content and save it.
    Save(SaveArgs),
}

#[derive(Args)]
struct TreeArgs {
    /// 專案根目錄。 / Project root folder.
    root: PathBuf,
    /// 要展開的資料夾，可重複指定，依序切換。 / Folder to toggle; repeatable, applied in order.
    #[arg(long = "expand", value_name = "DIR")]
    expand: Vec<PathBuf>,
}

#[derive(Args)]
struct StatusArgs {
    file: PathBuf,
    /// 以此檔案的內容取代緩衝區。 / Replace the buffer with this file's text.
    #[arg(long, value_name = "SRC")]
    content: Option<PathBuf>,
}

#[derive(Args)]
struct SaveArgs {
    /// 要開啟的檔案；略過時使用暫存緩衝區。 / File to open; a scratch buffer is used when omitted.
    file: Option<PathBuf>,
    #[arg(long, value_name = "SRC")]
    content: PathBuf,
    /// 回答儲存對話框的路徑；略過視為取消。 / Answer to the save dialog; omitted means cancelled.
    #[arg(long, value_name = "DEST")]
    destination: Option<PathBuf>,
}

/// 以命令列參數預先回答的對話框。 / Dialogs answered up front from command-line arguments.
#[derive(Debug, Default)]
struct PresetDialogs {
    save_destination: Option<PathBuf>,
}

impl DialogProvider for PresetDialogs {
    fn choose_save_destination(
        &mut self,
        default_name: &str,
        _filters: &[SaveFilter],
    ) -> Option<PathBuf> {
        debug!("save dialog for '{default_name}'");
        self.save_destination.take()
    }

    fn choose_open_target(&mut self, _mode: OpenMode) -> Option<PathBuf> {
        None
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli { config, command } = Cli::parse();
    let preferences = load_preferences(config.as_deref())?;
    init_logging(&preferences.logging.filter);

    match command {
        Commands::Tree(args) => execute_tree(args, &preferences),
        Commands::Status(args) => execute_status(args, &preferences),
        Commands::Save(args) => execute_save(args, &preferences),
    }
}

fn load_preferences(path: Option<&Path>) -> Result<Preferences> {
    match path {
        Some(path) => {
            let store = PreferencesStore::load(path).with_context(|| {
                format!("failed to load preferences from {}", path.display())
            })?;
            Ok(store.preferences().clone())
        }
        None => Ok(Preferences::default()),
    }
}

/// `RUST_LOG` 優先，否則使用偏好設定中的過濾器。 / `RUST_LOG` wins over the preference filter.
fn init_logging(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    if let Err(err) = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init()
    {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn session_config(preferences: &Preferences) -> SessionConfig {
    SessionConfig {
        debounce: preferences.editor.debounce(),
        default_save_name: preferences.files.default_save_name.clone(),
        save_filters: preferences
            .files
            .save_filters
            .iter()
            .map(|filter| SaveFilter::new(filter.name.clone(), filter.extensions.iter().cloned()))
            .collect(),
    }
}

fn new_driver(
    preferences: &Preferences,
    dialogs: PresetDialogs,
) -> Driver<LocalFileAuthority, PresetDialogs> {
    let driver = Driver::new(LocalFileAuthority::new(), dialogs);
    if !preferences.editor.watch_active_file {
        return driver;
    }
    match ActiveFileWatcher::new() {
        Ok(watcher) => driver.with_watcher(watcher),
        Err(err) => {
            warn!("file watching unavailable: {err}");
            driver
        }
    }
}

/// 若工作階段回報失敗則轉為錯誤。 / Turns the first reported failure into an error.
fn check_failures(events: &[SessionEvent]) -> Result<()> {
    for event in events {
        if let SessionEvent::Failed { operation, error } = event {
            bail!("{operation:?} failed: {error}");
        }
    }
    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn execute_tree(args: TreeArgs, preferences: &Preferences) -> Result<()> {
    let mut session = EditSession::new(session_config(preferences));
    let mut driver = new_driver(preferences, PresetDialogs::default());
    let now = Instant::now();

    session.open_folder(&args.root);
    driver.run_until_idle(&mut session, now);
    check_failures(&session.take_events())?;

    for dir in &args.expand {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            args.root.join(dir)
        };
        session.toggle(&dir, true);
        driver.run_until_idle(&mut session, now);
        check_failures(&session.take_events())?;
    }

    for row in session.visible_rows() {
        println!("{}", format_row(&row));
    }
    Ok(())
}

fn format_row(row: &TreeRow) -> String {
    let suffix = if row.node.is_directory() { "/" } else { "" };
    format!("{}{}{}", "  ".repeat(row.depth), row.node.name(), suffix)
}

fn execute_status(args: StatusArgs, preferences: &Preferences) -> Result<()> {
    let mut session = EditSession::new(session_config(preferences));
    let mut driver = new_driver(preferences, PresetDialogs::default());
    let now = Instant::now();

    session.open_file(&args.file);
    driver.run_until_idle(&mut session, now);
    check_failures(&session.take_events())?;

    if let Some(source) = &args.content {
        session.on_edit(read_source(source)?, now);
        driver.settle(&mut session, now);
    }

    println!("{}: {}", session.display_name(), session.status_text());
    Ok(())
}

fn execute_save(args: SaveArgs, preferences: &Preferences) -> Result<()> {
    let mut session = EditSession::new(session_config(preferences));
    let dialogs = PresetDialogs {
        save_destination: args.destination.clone(),
    };
    let mut driver = new_driver(preferences, dialogs);
    let now = Instant::now();

    if let Some(file) = &args.file {
        session.open_file(file);
        driver.run_until_idle(&mut session, now);
        check_failures(&session.take_events())?;
    }

    session.on_edit(read_source(&args.content)?, now);
    session.save();
    driver.run_until_idle(&mut session, now);

    let events = session.take_events();
    check_failures(&events)?;
    for event in events {
        match event {
            SessionEvent::Saved(path) => println!("saved {}", path.display()),
            SessionEvent::SaveCancelled => println!("save cancelled"),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillpad_project::{FileNode, NodeState};

    #[test]
    fn rows_are_indented_and_directories_marked() {
        let row = TreeRow {
            node: FileNode::directory("/proj/src/bin"),
            depth: 2,
            state: Some(NodeState::Collapsed),
        };
        assert_eq!(format_row(&row), "    bin/");

        let file = TreeRow {
            node: FileNode::file("/proj/a.txt"),
            depth: 0,
            state: None,
        };
        assert_eq!(format_row(&file), "a.txt");
    }

    #[test]
    fn preferences_map_onto_session_config() {
        let mut preferences = Preferences::default();
        preferences.files.default_save_name = "notes".to_string();
        let config = session_config(&preferences);
        assert_eq!(config.default_save_name, "notes");
        assert_eq!(config.debounce, preferences.editor.debounce());
        assert_eq!(config.save_filters, SessionConfig::default().save_filters);
    }
}
