use std::time::Instant;

use log::{debug, warn};

use crate::authority::{DialogProvider, FileAuthority};
use crate::file_monitor::ActiveFileWatcher;
use crate::notifications::Notification;
use crate::request::{Completion, Request};
use crate::session::EditSession;

/// 以同步方式執行工作階段請求的驅動器。 / Runs session requests synchronously against an authority and dialogs.
///
/// Requests are executed in the order the session queued them and each
/// completion is fed back before the next batch is drained.
pub struct Driver<A, D> {
    authority: A,
    dialogs: D,
    watcher: Option<ActiveFileWatcher>,
}

impl<A: FileAuthority, D: DialogProvider> Driver<A, D> {
    pub fn new(authority: A, dialogs: D) -> Self {
        Self {
            authority,
            dialogs,
            watcher: None,
        }
    }

    /// 附加作用中檔案監看器。 / Attaches a watcher that follows the session's active file.
    pub fn with_watcher(mut self, watcher: ActiveFileWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut A {
        &mut self.authority
    }

    pub fn dialogs_mut(&mut self) -> &mut D {
        &mut self.dialogs
    }

    /// 執行單一請求並產生對應的完成結果。 / Executes one request, producing its completion.
    pub fn execute(&mut self, request: &Request) -> Completion {
        match request {
            Request::ListDirectory { id, path } => Completion::Listing {
                id: *id,
                result: self.authority.list_directory(path),
            },
            Request::ReadFile { id, path } => Completion::FileRead {
                id: *id,
                result: self.authority.read_file(path),
            },
            Request::WriteFile { id, path, content } => Completion::FileWritten {
                id: *id,
                result: self.authority.write_file(path, content),
            },
            Request::CheckDirty { id, path, content } => Completion::DirtyChecked {
                id: *id,
                result: self.authority.check_dirty(path, content),
            },
            Request::ChooseSaveDestination {
                id,
                default_name,
                filters,
            } => Completion::SaveDestination {
                id: *id,
                choice: self.dialogs.choose_save_destination(default_name, filters),
            },
            Request::ChooseOpenTarget { id, mode } => Completion::OpenTarget {
                id: *id,
                choice: self.dialogs.choose_open_target(*mode),
            },
        }
    }

    /// 反覆執行佇列中的請求直到沒有新請求，回傳處理數量。 / Executes queued requests until none remain; returns how many ran.
    pub fn run_until_idle(&mut self, session: &mut EditSession, now: Instant) -> usize {
        let mut handled = 0;
        loop {
            self.forward_disk_changes(session, now);
            let requests = session.take_requests();
            if requests.is_empty() {
                break;
            }
            for request in requests {
                let completion = self.execute(&request);
                let outcome = session.complete(completion, now);
                debug!("request {} -> {outcome:?}", request.id());
                handled += 1;
            }
            self.follow_active_file(session);
        }
        handled
    }

    /// 推進時間直到沒有待觸發的計時器，回傳最後的時間點。 / Advances time through every pending debounce timer; returns the final instant.
    pub fn settle(&mut self, session: &mut EditSession, now: Instant) -> Instant {
        let mut now = now;
        self.run_until_idle(session, now);
        while let Some(deadline) = session.next_deadline() {
            now = now.max(deadline);
            session.tick(now);
            self.run_until_idle(session, now);
        }
        now
    }

    fn follow_active_file(&mut self, session: &EditSession) {
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(err) = watcher.follow(session.active_path()) {
                warn!("cannot watch active file: {err}");
            }
        }
    }

    fn forward_disk_changes(&mut self, session: &mut EditSession, now: Instant) {
        let Some(changed) = self.watcher.as_ref().and_then(ActiveFileWatcher::drain) else {
            return;
        };
        session.handle(Notification::FileChangedOnDisk(changed), now);
    }
}
