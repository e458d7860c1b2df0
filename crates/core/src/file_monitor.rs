use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use log::debug;
use notify::event::{EventKind, ModifyKind};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

/// 監看作用中檔案時可能發生的錯誤。 / Errors raised while watching the active file.
#[derive(Debug, Error)]
pub enum FileMonitorError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

/// 只監看目前作用中的單一檔案，回報其在磁碟上的變更。 / Watches the single active file and reports on-disk changes to it.
///
/// The parent directory is registered rather than the file itself so the watch
/// survives saves that replace the file through a rename.
pub struct ActiveFileWatcher {
    watcher: RecommendedWatcher,
    rx: Receiver<PathBuf>,
    watched: Option<PathBuf>,
}

impl ActiveFileWatcher {
    pub fn new() -> Result<Self, FileMonitorError> {
        let (tx, rx) = mpsc::channel();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    if is_content_change(&event.kind) {
                        for path in event.paths {
                            let _ = tx.send(path);
                        }
                    }
                }
            },
            Config::default(),
        )?;
        Ok(Self {
            watcher,
            rx,
            watched: None,
        })
    }

    pub fn watched(&self) -> Option<&Path> {
        self.watched.as_deref()
    }

    /// 改為監看 `path`（或停止監看）；相同路徑不會重新註冊。 / Follows `path`, or stops watching on `None`; the same path is not re-registered.
    pub fn follow(&mut self, path: Option<&Path>) -> Result<(), FileMonitorError> {
        if self.watched.as_deref() == path {
            return Ok(());
        }
        if let Some(previous) = self.watched.take() {
            let target = watch_target(&previous);
            if let Err(err) = self.watcher.unwatch(target) {
                debug!("unwatch {} failed: {err}", target.display());
            }
        }
        if let Some(path) = path {
            self.watcher
                .watch(watch_target(path), RecursiveMode::NonRecursive)?;
            self.watched = Some(path.to_path_buf());
        }
        Ok(())
    }

    /// 取出已發生的變更，只保留目前監看的路徑並去除重複。 / Drains pending changes, keeping only the watched path and collapsing repeats.
    pub fn drain(&self) -> Option<PathBuf> {
        let watched = self.watched.as_deref()?;
        let mut changed = false;
        while let Ok(path) = self.rx.try_recv() {
            changed |= path == watched;
        }
        changed.then(|| watched.to_path_buf())
    }

    /// 在期限內等待目前檔案的下一次變更。 / Waits up to `timeout` for a change to the watched file.
    pub fn wait(&self, timeout: Duration) -> Option<PathBuf> {
        let watched = self.watched.as_deref()?;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match self.rx.recv_timeout(remaining) {
                Ok(path) if path == watched => return Some(path),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

fn watch_target(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => path,
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Create(_)
            | EventKind::Remove(_)
    )
}
