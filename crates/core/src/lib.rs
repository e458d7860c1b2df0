pub mod authority;
pub mod dirty;
pub mod driver;
pub mod error;
pub mod file_monitor;
pub mod local;
pub mod notifications;
pub mod request;
pub mod session;
mod text;

pub use authority::{DialogProvider, FileAuthority, LoadedFile, OpenMode, SaveFilter};
pub use dirty::{CheckKey, DirtyCheck, DirtyStatus, DirtyTracker, DEFAULT_DEBOUNCE};
pub use driver::Driver;
pub use error::AuthorityError;
pub use file_monitor::{ActiveFileWatcher, FileMonitorError};
pub use local::LocalFileAuthority;
pub use notifications::{Notification, NotificationBus, Subscription, SubscriptionId};
pub use request::{Completion, Outcome, Request, RequestId};
pub use session::{EditSession, Operation, SessionConfig, SessionEvent};
