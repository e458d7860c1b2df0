use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

/// 工作階段需回應的外部通知。 / Inbound notifications the session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ProjectFolderSelected(PathBuf),
    SaveRequested,
    OpenFileDialogRequested,
    OpenFolderDialogRequested,
    /// 磁碟上的檔案被外部修改（僅偵測，不合併）。 / The file changed on disk; detection only, never merged.
    FileChangedOnDisk(PathBuf),
}

/// 訂閱編號。 / Identifies one subscription on a bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 訂閱者持有的接收端。 / Receiving half held by a subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: Receiver<Notification>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// 嘗試取得下一則通知（非阻塞）。 / Fetches the next notification without blocking.
    pub fn try_next(&self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }
}

/// 將通知分送給所有訂閱者。 / Fans notifications out to every live subscriber.
#[derive(Debug, Default)]
pub struct NotificationBus {
    subscribers: Vec<(SubscriptionId, Sender<Notification>)>,
    next_id: u64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let (tx, rx) = mpsc::channel();
        self.subscribers.push((id, tx));
        Subscription { id, rx }
    }

    /// 取消訂閱；之後不會再收到任何通知。 / Detaches a subscriber; nothing is delivered to it afterwards.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    /// 發送通知並回傳送達數量；已中斷的接收端會被移除。 / Publishes to every subscriber, pruning dropped receivers.
    pub fn publish(&mut self, notification: Notification) -> usize {
        self.subscribers
            .retain(|(_, tx)| tx.send(notification.clone()).is_ok());
        self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
