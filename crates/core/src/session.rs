use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use quillpad_project::{
    display_name, DirectoryTree, FetchOutcome, FetchRequest, ToggleOutcome, TreeRow,
};

use crate::authority::{OpenMode, SaveFilter};
use crate::dirty::{CheckKey, DirtyStatus, DirtyTracker, DEFAULT_DEBOUNCE};
use crate::error::AuthorityError;
use crate::notifications::{Notification, NotificationBus, Subscription};
use crate::request::{Completion, Outcome, Request, RequestId};

/// 工作階段設定。 / Tunables for an [`EditSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub debounce: Duration,
    pub default_save_name: String,
    pub save_filters: Vec<SaveFilter>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            default_save_name: "untitled".to_string(),
            save_filters: vec![
                SaveFilter::new("Markdown", ["md", "markdown"]),
                SaveFilter::new("Text File", ["txt"]),
            ],
        }
    }
}

/// 失敗事件所屬的操作。 / Operation a failure event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListDirectory,
    Open,
    Save,
}

/// 非阻塞的回報事件，由介面層自行呈現。 / Non-blocking reports for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened(PathBuf),
    Saved(PathBuf),
    SaveCancelled,
    Failed {
        operation: Operation,
        error: AuthorityError,
    },
}

#[derive(Debug)]
enum Pending {
    Listing(FetchRequest),
    Read,
    Write {
        path: PathBuf,
        stamp: u64,
        /// 暫存緩衝區另存時寫入的內容，用於成功後接管路徑。 / Snapshot written from a scratch buffer, adopted on success.
        scratch: Option<String>,
    },
    Check(CheckKey),
    /// 詢問儲存位置時的暫存緩衝區快照。 / Scratch buffer captured when the save dialog was requested.
    SaveDestination {
        snapshot: String,
    },
    OpenTarget(OpenMode),
}

/// 編輯工作階段：協調作用中檔案、內容緩衝區、dirty 追蹤與專案樹。 / Editing session coordinating the active file, its buffer, dirty tracking and the project tree.
///
/// 工作階段本身不做任何 I/O：所有外部工作都以 [`Request`] 排入佇列，結果經由
/// [`EditSession::complete`] 送回並依請求編號驗證。 / The session performs no I/O:
/// external work is queued as [`Request`]s and results come back through
/// [`EditSession::complete`], validated against the id they were issued with.
#[derive(Debug)]
pub struct EditSession {
    config: SessionConfig,
    active_path: Option<PathBuf>,
    content: String,
    tree: DirectoryTree,
    tracker: DirtyTracker,
    outbox: VecDeque<Request>,
    pending: HashMap<RequestId, Pending>,
    latest_open: Option<RequestId>,
    dialog: Option<RequestId>,
    events: Vec<SessionEvent>,
    next_request: u64,
    subscription: Option<Subscription>,
    disposed: bool,
}

impl EditSession {
    pub fn new(config: SessionConfig) -> Self {
        let tracker = DirtyTracker::new(config.debounce);
        Self {
            config,
            active_path: None,
            content: String::new(),
            tree: DirectoryTree::new(),
            tracker,
            outbox: VecDeque::new(),
            pending: HashMap::new(),
            latest_open: None,
            dialog: None,
            events: Vec::new(),
            next_request: 0,
            subscription: None,
            disposed: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active_path.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    pub fn status(&self) -> DirtyStatus {
        self.tracker.status()
    }

    pub fn status_text(&self) -> &'static str {
        self.status().label()
    }

    /// 作用中檔案的顯示名稱；暫存緩衝區顯示預設檔名。 / Label for the active file; scratch buffers show the default save name.
    pub fn display_name(&self) -> String {
        match self.active_path.as_deref() {
            Some(path) => display_name(path, self.tree.root()),
            None => self.config.default_save_name.clone(),
        }
    }

    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    pub fn visible_rows(&self) -> Vec<TreeRow> {
        self.tree.visible_rows()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// 取出待執行的外部請求。 / Drains the queued outbound requests.
    pub fn take_requests(&mut self) -> Vec<Request> {
        self.outbox.drain(..).collect()
    }

    pub fn has_queued_requests(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// 已送出但尚未完成的請求數。 / Number of issued requests still awaiting completion.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if self.disposed {
            None
        } else {
            self.tracker.next_deadline()
        }
    }

    /// 開啟檔案；較新的開啟請求會取代尚未完成的舊請求。 / Opens a file; a newer open supersedes any still in flight.
    pub fn open_file(&mut self, path: impl Into<PathBuf>) {
        if self.disposed {
            return;
        }
        let path = path.into();
        let id = self.next_id();
        if let Some(previous) = self.latest_open.replace(id) {
            debug!("open {previous} superseded by {id}");
        }
        self.pending.insert(id, Pending::Read);
        self.outbox.push_back(Request::ReadFile { id, path });
    }

    /// 更新內容緩衝區；有作用中檔案時排程 dirty 比對。 / Replaces the live buffer and schedules reconciliation when a file is active.
    pub fn on_edit(&mut self, content: impl Into<String>, now: Instant) {
        if self.disposed {
            return;
        }
        self.content = content.into();
        if let Some(path) = self.active_path.as_deref() {
            self.tracker
                .on_content_change(path, self.content.clone(), now);
        }
    }

    /// 儲存目前內容；暫存緩衝區會先詢問儲存位置。 / Saves the buffer, asking for a destination first when no file is active.
    pub fn save(&mut self) {
        if self.disposed {
            return;
        }
        match self.active_path.clone() {
            Some(path) => {
                let stamp = self.tracker.last_stamp();
                self.queue_write(path, self.content.clone(), stamp, None);
            }
            None => {
                if let Some(id) = self.dialog {
                    debug!("save requested while dialog {id} is open");
                    return;
                }
                let id = self.next_id();
                self.dialog = Some(id);
                self.pending.insert(
                    id,
                    Pending::SaveDestination {
                        snapshot: self.content.clone(),
                    },
                );
                self.outbox.push_back(Request::ChooseSaveDestination {
                    id,
                    default_name: self.config.default_save_name.clone(),
                    filters: self.config.save_filters.clone(),
                });
            }
        }
    }

    /// 設定專案根目錄並重新載入整棵樹。 / Sets the project root, resetting the whole tree.
    pub fn open_folder(&mut self, path: impl Into<PathBuf>) {
        if self.disposed {
            return;
        }
        let fetch = self.tree.set_root(path);
        self.queue_listing(fetch);
    }

    pub fn close_folder(&mut self) {
        if self.disposed {
            return;
        }
        self.tree.clear_root();
    }

    /// 點擊樹狀節點：檔案會被開啟，資料夾切換展開。 / Handles a tree click: files open, directories toggle.
    ///
    /// Returns `None` once the session has been disposed.
    pub fn toggle(&mut self, path: &Path, is_directory: bool) -> Option<ToggleOutcome> {
        if self.disposed {
            return None;
        }
        let outcome = self.tree.toggle(path, is_directory);
        match &outcome {
            ToggleOutcome::OpenFile(file) => self.open_file(file.clone()),
            ToggleOutcome::Fetch(fetch) => self.queue_listing(fetch.clone()),
            _ => {}
        }
        Some(outcome)
    }

    pub fn request_open_file_dialog(&mut self) {
        self.request_open_target(OpenMode::File);
    }

    pub fn request_open_folder_dialog(&mut self) {
        self.request_open_target(OpenMode::Directory);
    }

    /// 觸發到期的防抖計時器。 / Fires a due debounce timer as a dirty check request.
    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        if let Some(check) = self.tracker.poll(now) {
            let id = self.next_id();
            self.outbox.push_back(Request::CheckDirty {
                id,
                path: check.key.path.clone(),
                content: check.content,
            });
            self.pending.insert(id, Pending::Check(check.key));
        }
    }

    /// 處理外部通知。 / Reacts to one inbound notification.
    pub fn handle(&mut self, notification: Notification, now: Instant) {
        if self.disposed {
            return;
        }
        match notification {
            Notification::ProjectFolderSelected(path) => self.open_folder(path),
            Notification::SaveRequested => self.save(),
            Notification::OpenFileDialogRequested => self.request_open_file_dialog(),
            Notification::OpenFolderDialogRequested => self.request_open_folder_dialog(),
            Notification::FileChangedOnDisk(path) => {
                if self.active_path.as_deref() == Some(path.as_path()) {
                    debug!("{} changed on disk; rechecking", path.display());
                    self.tracker
                        .on_content_change(&path, self.content.clone(), now);
                }
            }
        }
    }

    /// 訂閱通知匯流排。 / Subscribes the session to a notification bus.
    pub fn attach(&mut self, bus: &mut NotificationBus) {
        if self.disposed || self.subscription.is_some() {
            return;
        }
        self.subscription = Some(bus.subscribe());
    }

    /// 處理所有已收到的通知，回傳處理數量。 / Handles every received notification; returns how many.
    pub fn pump_notifications(&mut self, now: Instant) -> usize {
        let received: Vec<Notification> = match &self.subscription {
            Some(subscription) => std::iter::from_fn(|| subscription.try_next()).collect(),
            None => Vec::new(),
        };
        let count = received.len();
        for notification in received {
            self.handle(notification, now);
        }
        count
    }

    /// 結束工作階段：取消訂閱並忽略之後的所有結果。 / Tears the session down; nothing mutates it afterwards.
    pub fn dispose(&mut self, bus: &mut NotificationBus) {
        if let Some(subscription) = self.subscription.take() {
            bus.unsubscribe(subscription.id());
        }
        self.outbox.clear();
        self.pending.clear();
        self.latest_open = None;
        self.dialog = None;
        self.disposed = true;
        info!("edit session disposed");
    }

    /// 套用外部工作的結果。 / Applies the result of an external request.
    pub fn complete(&mut self, completion: Completion, now: Instant) -> Outcome {
        if self.disposed {
            return Outcome::Stale;
        }
        let id = completion.id();
        let Some(pending) = self.pending.remove(&id) else {
            debug!("completion for unknown request {id}");
            return Outcome::Stale;
        };

        match (pending, completion) {
            (Pending::Listing(fetch), Completion::Listing { result, .. }) => {
                let failure = result.as_ref().err().cloned();
                match (self.tree.complete_fetch(&fetch, result), failure) {
                    (FetchOutcome::Stale, _) => Outcome::Stale,
                    (_, Some(error)) => self.fail(Operation::ListDirectory, error),
                    _ => Outcome::Applied,
                }
            }
            (Pending::Read, Completion::FileRead { result, .. }) => {
                if self.latest_open != Some(id) {
                    debug!("discarding superseded open {id}");
                    return Outcome::Stale;
                }
                self.latest_open = None;
                match result {
                    Ok(loaded) => {
                        info!("opened {}", loaded.path.display());
                        self.tracker.on_file_loaded(loaded.path.clone());
                        self.active_path = Some(loaded.path.clone());
                        self.content = loaded.content;
                        self.events.push(SessionEvent::Opened(loaded.path));
                        Outcome::Applied
                    }
                    Err(error) => self.fail(Operation::Open, error),
                }
            }
            (
                Pending::Write {
                    path,
                    stamp,
                    scratch,
                },
                Completion::FileWritten { result, .. },
            ) => match result {
                Ok(()) => {
                    info!("saved {}", path.display());
                    match scratch {
                        Some(written) if self.active_path.is_none() => {
                            self.adopt_saved_scratch(path.clone(), &written, now)
                        }
                        _ if self.active_path.as_deref() == Some(path.as_path()) => {
                            if !self.tracker.mark_saved(&path, stamp) {
                                self.recheck_active(now);
                            }
                        }
                        _ => debug!("{} is no longer the active file", path.display()),
                    }
                    self.events.push(SessionEvent::Saved(path));
                    Outcome::Applied
                }
                Err(error) => self.fail(Operation::Save, error),
            },
            (Pending::Check(key), Completion::DirtyChecked { result, .. }) => {
                self.tracker.apply(&key, result)
            }
            (
                Pending::SaveDestination { snapshot },
                Completion::SaveDestination { choice, .. },
            ) => {
                self.dialog = None;
                match choice {
                    Some(destination) => {
                        let stamp = self.tracker.last_stamp();
                        self.queue_write(destination, snapshot.clone(), stamp, Some(snapshot));
                        Outcome::Applied
                    }
                    None => {
                        debug!("save dialog cancelled");
                        self.events.push(SessionEvent::SaveCancelled);
                        Outcome::Cancelled
                    }
                }
            }
            (Pending::OpenTarget(mode), Completion::OpenTarget { choice, .. }) => {
                self.dialog = None;
                match (choice, mode) {
                    (Some(path), OpenMode::File) => {
                        self.open_file(path);
                        Outcome::Applied
                    }
                    (Some(path), OpenMode::Directory) => {
                        self.open_folder(path);
                        Outcome::Applied
                    }
                    (None, _) => Outcome::Cancelled,
                }
            }
            (pending, completion) => {
                warn!("completion {completion:?} does not match pending {pending:?}");
                Outcome::Stale
            }
        }
    }

    fn adopt_saved_scratch(&mut self, path: PathBuf, written: &str, now: Instant) {
        self.tracker.on_file_loaded(path.clone());
        self.active_path = Some(path.clone());
        if self.content != written {
            self.tracker
                .on_content_change(&path, self.content.clone(), now);
        }
    }

    /// 對作用中檔案重新排程比對。 / Schedules a fresh reconciliation of the active buffer.
    fn recheck_active(&mut self, now: Instant) {
        if let Some(path) = self.active_path.clone() {
            debug!("rechecking {} after a late save", path.display());
            self.tracker
                .on_content_change(&path, self.content.clone(), now);
        }
    }

    fn fail(&mut self, operation: Operation, error: AuthorityError) -> Outcome {
        warn!("{operation:?} failed: {error}");
        self.events.push(SessionEvent::Failed {
            operation,
            error: error.clone(),
        });
        Outcome::Failed(error)
    }

    fn request_open_target(&mut self, mode: OpenMode) {
        if self.disposed {
            return;
        }
        if let Some(id) = self.dialog {
            debug!("open dialog requested while dialog {id} is open");
            return;
        }
        let id = self.next_id();
        self.dialog = Some(id);
        self.pending.insert(id, Pending::OpenTarget(mode));
        self.outbox.push_back(Request::ChooseOpenTarget { id, mode });
    }

    fn queue_listing(&mut self, fetch: FetchRequest) {
        let id = self.next_id();
        self.outbox.push_back(Request::ListDirectory {
            id,
            path: fetch.path.clone(),
        });
        self.pending.insert(id, Pending::Listing(fetch));
    }

    fn queue_write(
        &mut self,
        path: PathBuf,
        content: String,
        stamp: u64,
        scratch: Option<String>,
    ) {
        let id = self.next_id();
        self.outbox.push_back(Request::WriteFile {
            id,
            path: path.clone(),
            content,
        });
        self.pending.insert(
            id,
            Pending::Write {
                path,
                stamp,
                scratch,
            },
        );
    }

    fn next_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId::new(self.next_request)
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::LoadedFile;

    fn single_request(session: &mut EditSession) -> Request {
        let mut requests = session.take_requests();
        assert_eq!(requests.len(), 1, "expected one request: {requests:?}");
        requests.remove(0)
    }

    fn open(session: &mut EditSession, path: &str, content: &str, now: Instant) {
        session.open_file(path);
        let request = single_request(session);
        let outcome = session.complete(
            Completion::FileRead {
                id: request.id(),
                result: Ok(LoadedFile {
                    path: PathBuf::from(path),
                    content: content.to_string(),
                }),
            },
            now,
        );
        assert_eq!(outcome, Outcome::Applied);
    }

    #[test]
    fn failed_open_keeps_previous_file() {
        let now = Instant::now();
        let mut session = EditSession::default();
        open(&mut session, "/a.txt", "alpha", now);

        session.open_file("/missing.txt");
        let request = single_request(&mut session);
        let error = AuthorityError::NotFound(PathBuf::from("/missing.txt"));
        let outcome = session.complete(
            Completion::FileRead {
                id: request.id(),
                result: Err(error.clone()),
            },
            now,
        );

        assert_eq!(outcome, Outcome::Failed(error.clone()));
        assert_eq!(session.active_path(), Some(Path::new("/a.txt")));
        assert_eq!(session.content(), "alpha");
        let events = session.take_events();
        assert_eq!(
            events.last(),
            Some(&SessionEvent::Failed {
                operation: Operation::Open,
                error
            })
        );
    }

    #[test]
    fn superseded_open_is_discarded() {
        let now = Instant::now();
        let mut session = EditSession::default();
        session.open_file("/a.txt");
        session.open_file("/b.txt");
        let requests = session.take_requests();
        assert_eq!(requests.len(), 2);

        let late_a = Completion::FileRead {
            id: requests[0].id(),
            result: Ok(LoadedFile {
                path: PathBuf::from("/a.txt"),
                content: "a".into(),
            }),
        };
        let b = Completion::FileRead {
            id: requests[1].id(),
            result: Ok(LoadedFile {
                path: PathBuf::from("/b.txt"),
                content: "b".into(),
            }),
        };
        assert_eq!(session.complete(b, now), Outcome::Applied);
        assert_eq!(session.complete(late_a, now), Outcome::Stale);
        assert_eq!(session.active_path(), Some(Path::new("/b.txt")));
    }

    #[test]
    fn edits_without_active_file_are_not_tracked() {
        let now = Instant::now();
        let mut session = EditSession::default();
        session.on_edit("scratch", now);
        assert_eq!(session.content(), "scratch");
        assert!(session.next_deadline().is_none());
        assert_eq!(session.display_name(), "untitled");
    }

    #[test]
    fn save_failure_leaves_dirty_flag() {
        let now = Instant::now();
        let mut session = EditSession::default();
        open(&mut session, "/a.txt", "foo", now);
        session.on_edit("foobar", now);
        session.tick(now + DEFAULT_DEBOUNCE);
        let check = single_request(&mut session);
        session.complete(
            Completion::DirtyChecked {
                id: check.id(),
                result: Ok(true),
            },
            now,
        );
        assert!(session.is_dirty());

        session.save();
        let write = single_request(&mut session);
        assert!(matches!(&write, Request::WriteFile { content, .. } if content == "foobar"));
        let error = AuthorityError::PermissionDenied(PathBuf::from("/a.txt"));
        let outcome = session.complete(
            Completion::FileWritten {
                id: write.id(),
                result: Err(error.clone()),
            },
            now,
        );
        assert_eq!(outcome, Outcome::Failed(error));
        assert!(session.is_dirty());
        assert_eq!(session.status_text(), "Unsaved");
    }

    #[test]
    fn scratch_save_adopts_destination() {
        let now = Instant::now();
        let mut session = EditSession::default();
        session.on_edit("draft", now);
        session.save();
        let dialog = single_request(&mut session);
        match &dialog {
            Request::ChooseSaveDestination {
                default_name,
                filters,
                ..
            } => {
                assert_eq!(default_name, "untitled");
                assert_eq!(filters.len(), 2);
            }
            other => panic!("unexpected request {other:?}"),
        }
        session.complete(
            Completion::SaveDestination {
                id: dialog.id(),
                choice: Some(PathBuf::from("/notes.md")),
            },
            now,
        );
        let write = single_request(&mut session);
        session.complete(
            Completion::FileWritten {
                id: write.id(),
                result: Ok(()),
            },
            now,
        );

        assert_eq!(session.active_path(), Some(Path::new("/notes.md")));
        assert!(!session.is_dirty());
        assert_eq!(
            session.take_events(),
            vec![SessionEvent::Saved(PathBuf::from("/notes.md"))]
        );
    }

    #[test]
    fn cancelled_open_dialog_is_a_noop() {
        let now = Instant::now();
        let mut session = EditSession::default();
        session.handle(Notification::OpenFolderDialogRequested, now);
        let dialog = single_request(&mut session);
        assert!(matches!(
            dialog,
            Request::ChooseOpenTarget {
                mode: OpenMode::Directory,
                ..
            }
        ));
        let outcome = session.complete(
            Completion::OpenTarget {
                id: dialog.id(),
                choice: None,
            },
            now,
        );
        assert_eq!(outcome, Outcome::Cancelled);
        assert!(session.tree().root().is_none());
        assert!(session.take_requests().is_empty());
    }
}
