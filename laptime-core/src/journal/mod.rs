//! The race log: in-memory sequence, persisted file, lock and notifications
//!
//! The log is shared between independent processes. One writer appends
//! passages as they happen; report generators and backup copiers read it.
//! Every access to the file goes through [`LogLock`].

pub mod events;
pub mod file;
pub mod lock;
pub mod notify;

// Re-export journal types
pub use events::EventLog;
pub use file::{parse_log, LogFile};
pub use lock::{lock_path, LockPolicy, LogLock};
pub use notify::{
    ChangeListener, ChangeNotifier, NullNotifier, UdpNotifier, DEFAULT_NOTIFY_ADDRESS,
};
