use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::AuthorityError;
use crate::request::Outcome;

/// 預設的防抖間隔。 / Default debounce interval for dirty reconciliation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// 一次比對的身分：路徑加上單調遞增的序號。 / Identity of one reconciliation: path plus monotonic stamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckKey {
    pub path: PathBuf,
    pub stamp: u64,
}

/// 計時器觸發後要送往外部的比對工作。 / A reconciliation ready to be sent to the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyCheck {
    pub key: CheckKey,
    pub content: String,
}

/// 顯示於狀態列的暫時狀態。 / Transient status shown next to the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyStatus {
    Saved,
    Unsaved,
    Checking,
    CheckFailed,
}

impl DirtyStatus {
    pub fn label(self) -> &'static str {
        match self {
            DirtyStatus::Saved => "Saved",
            DirtyStatus::Unsaved => "Unsaved",
            DirtyStatus::Checking => "Checking...",
            DirtyStatus::CheckFailed => "Check failed",
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCheck {
    check: DirtyCheck,
    due: Instant,
}

/// 追蹤作用中檔案是否與已儲存內容不同。 / Tracks whether the active file's buffer diverges from its saved content.
///
/// 每次編輯都會重新啟動計時器，只有未被取代的計時器才會送出比對；結果僅在
/// 路徑仍為作用中且序號高於已套用者時生效。 / Each edit restarts the timer and
/// only an unsuperseded timer produces a check; a result is applied only while
/// its path is still active and its stamp beats every stamp applied so far.
#[derive(Debug)]
pub struct DirtyTracker {
    interval: Duration,
    active: Option<PathBuf>,
    is_dirty: bool,
    failed: bool,
    pending: Option<PendingCheck>,
    outstanding: BTreeSet<u64>,
    last_stamp: u64,
    applied_stamp: u64,
}

impl DirtyTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: None,
            is_dirty: false,
            failed: false,
            pending: None,
            outstanding: BTreeSet::new(),
            last_stamp: 0,
            applied_stamp: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// 最近一次編輯的序號。 / Stamp of the most recent edit.
    pub fn last_stamp(&self) -> u64 {
        self.last_stamp
    }

    pub fn status(&self) -> DirtyStatus {
        if !self.outstanding.is_empty() {
            DirtyStatus::Checking
        } else if self.failed {
            DirtyStatus::CheckFailed
        } else if self.is_dirty {
            DirtyStatus::Unsaved
        } else {
            DirtyStatus::Saved
        }
    }

    /// 檔案載入後立即視為已儲存，並取消先前檔案的計時器與比對。 / A freshly loaded file is clean; timers and checks of the previous file are dropped.
    pub fn on_file_loaded(&mut self, path: impl Into<PathBuf>) {
        self.active = Some(path.into());
        self.reset();
    }

    /// 進入暫存緩衝區模式：沒有可比對的對象。 / Scratch buffer: nothing to compare against.
    pub fn deactivate(&mut self) {
        self.active = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.is_dirty = false;
        self.failed = false;
        if let Some(stale) = self.pending.take() {
            debug!(
                "dropping pending dirty check for {}",
                stale.check.key.path.display()
            );
        }
        self.outstanding.clear();
        self.applied_stamp = self.last_stamp;
    }

    /// 排程一次比對，取代尚未觸發的計時器。 / Schedules a reconciliation, superseding any timer that has not fired.
    pub fn on_content_change(&mut self, path: &Path, content: impl Into<String>, now: Instant) {
        if self.active.as_deref() != Some(path) {
            debug!("ignoring content change for inactive {}", path.display());
            return;
        }
        self.last_stamp += 1;
        self.pending = Some(PendingCheck {
            check: DirtyCheck {
                key: CheckKey {
                    path: path.to_path_buf(),
                    stamp: self.last_stamp,
                },
                content: content.into(),
            },
            due: now + self.interval,
        });
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.due)
    }

    /// 若計時器已到期則取出比對工作。 / Fires the timer if it is due.
    pub fn poll(&mut self, now: Instant) -> Option<DirtyCheck> {
        if self.pending.as_ref()?.due > now {
            return None;
        }
        let fired = self.pending.take()?.check;
        self.outstanding.insert(fired.key.stamp);
        Some(fired)
    }

    /// 套用比對結果；過期結果直接捨棄。 / Applies a reconciliation result, discarding stale ones.
    pub fn apply(&mut self, key: &CheckKey, result: Result<bool, AuthorityError>) -> Outcome {
        if self.active.as_deref() != Some(key.path.as_path()) {
            debug!(
                "discarding dirty result for {} (no longer active)",
                key.path.display()
            );
            return Outcome::Stale;
        }
        self.outstanding.remove(&key.stamp);
        if key.stamp <= self.applied_stamp {
            debug!(
                "discarding dirty result stamp {} (applied {})",
                key.stamp, self.applied_stamp
            );
            return Outcome::Stale;
        }
        self.applied_stamp = key.stamp;

        match result {
            Ok(dirty) => {
                self.is_dirty = dirty;
                self.failed = false;
                Outcome::Applied
            }
            Err(err) => {
                warn!("dirty check failed: {err}");
                self.is_dirty = false;
                self.failed = true;
                Outcome::Failed(err)
            }
        }
    }

    /// 儲存成功：序號不大於 `stamp` 的比對皆視為過期。 / A successful save makes every check stamped at or below `stamp` stale.
    ///
    /// Returns `false` when the buffer may still differ from what was written:
    /// a newer result was already applied, or a newer edit is still waiting
    /// for reconciliation. The flags are left alone in that case.
    pub fn mark_saved(&mut self, path: &Path, stamp: u64) -> bool {
        if self.active.as_deref() != Some(path) {
            return false;
        }
        self.outstanding.retain(|outstanding| *outstanding > stamp);
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.check.key.stamp <= stamp)
        {
            self.pending = None;
        }
        if stamp < self.applied_stamp {
            debug!(
                "save of stamp {stamp} finished after stamp {} was applied",
                self.applied_stamp
            );
            return false;
        }
        self.applied_stamp = stamp;
        let newer_edit = self.pending.is_some() || !self.outstanding.is_empty();
        if !newer_edit {
            self.is_dirty = false;
            self.failed = false;
        }
        !newer_edit
    }
}

impl Default for DirtyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_for(path: &str) -> DirtyTracker {
        let mut tracker = DirtyTracker::default();
        tracker.on_file_loaded(path);
        tracker
    }

    #[test]
    fn timer_fires_only_after_quiet_interval() {
        let start = Instant::now();
        let path = Path::new("/a.txt");
        let mut tracker = tracker_for("/a.txt");

        tracker.on_content_change(path, "f", start);
        tracker.on_content_change(path, "fo", start + Duration::from_millis(300));
        assert!(tracker.poll(start + Duration::from_millis(600)).is_none());

        let check = tracker
            .poll(start + Duration::from_millis(800))
            .expect("timer due");
        assert_eq!(check.content, "fo");
        assert_eq!(check.key.stamp, 2);
        assert_eq!(tracker.status(), DirtyStatus::Checking);
        assert!(tracker.poll(start + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn newer_stamp_wins_regardless_of_completion_order() {
        let start = Instant::now();
        let path = Path::new("/a.txt");
        let mut tracker = tracker_for("/a.txt");

        tracker.on_content_change(path, "foobar", start);
        let first = tracker.poll(start + DEFAULT_DEBOUNCE).unwrap();
        tracker.on_content_change(path, "foo", start + Duration::from_secs(1));
        let second = tracker.poll(start + Duration::from_secs(2)).unwrap();

        assert_eq!(tracker.apply(&second.key, Ok(false)), Outcome::Applied);
        assert_eq!(tracker.apply(&first.key, Ok(true)), Outcome::Stale);
        assert!(!tracker.is_dirty());
        assert_eq!(tracker.status(), DirtyStatus::Saved);
    }

    #[test]
    fn results_for_previous_file_are_discarded() {
        let start = Instant::now();
        let mut tracker = tracker_for("/a.txt");
        tracker.on_content_change(Path::new("/a.txt"), "changed", start);
        let check = tracker.poll(start + DEFAULT_DEBOUNCE).unwrap();

        tracker.on_file_loaded("/b.txt");
        assert_eq!(tracker.apply(&check.key, Ok(true)), Outcome::Stale);
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn failure_fails_open_to_clean() {
        let start = Instant::now();
        let path = Path::new("/a.txt");
        let mut tracker = tracker_for("/a.txt");
        tracker.on_content_change(path, "x", start);
        let check = tracker.poll(start + DEFAULT_DEBOUNCE).unwrap();

        let err = AuthorityError::NotFound(path.to_path_buf());
        assert_eq!(tracker.apply(&check.key, Err(err.clone())), Outcome::Failed(err));
        assert!(!tracker.is_dirty());
        assert_eq!(tracker.status(), DirtyStatus::CheckFailed);
    }

    #[test]
    fn save_invalidates_older_checks() {
        let start = Instant::now();
        let path = Path::new("/a.txt");
        let mut tracker = tracker_for("/a.txt");
        tracker.on_content_change(path, "draft", start);
        let check = tracker.poll(start + DEFAULT_DEBOUNCE).unwrap();

        assert!(tracker.mark_saved(path, tracker.last_stamp()));
        assert_eq!(tracker.apply(&check.key, Ok(true)), Outcome::Stale);
        assert_eq!(tracker.status(), DirtyStatus::Saved);
    }

    #[test]
    fn late_save_keeps_newer_result() {
        let start = Instant::now();
        let path = Path::new("/a.txt");
        let mut tracker = tracker_for("/a.txt");
        tracker.on_content_change(path, "X", start);
        let saved_stamp = tracker.last_stamp();
        tracker.on_content_change(path, "Y", start);
        let check = tracker.poll(start + DEFAULT_DEBOUNCE).unwrap();
        assert_eq!(tracker.apply(&check.key, Ok(true)), Outcome::Applied);

        assert!(!tracker.mark_saved(path, saved_stamp));
        assert!(tracker.is_dirty());
        assert_eq!(tracker.status(), DirtyStatus::Unsaved);
    }

    #[test]
    fn save_with_newer_pending_edit_is_not_clean() {
        let start = Instant::now();
        let path = Path::new("/a.txt");
        let mut tracker = tracker_for("/a.txt");
        tracker.on_content_change(path, "X", start);
        let saved_stamp = tracker.last_stamp();
        tracker.on_content_change(path, "Y", start);

        assert!(!tracker.mark_saved(path, saved_stamp));
        assert!(tracker.next_deadline().is_some());
    }

    #[test]
    fn changes_without_active_file_are_ignored() {
        let mut tracker = DirtyTracker::default();
        tracker.on_content_change(Path::new("/a.txt"), "x", Instant::now());
        assert!(tracker.next_deadline().is_none());
    }
}
