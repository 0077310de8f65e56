// src/timer/mod.rs — Task timer: engine, persistence, reconciliation, service

pub mod clock;
pub mod engine;
pub mod format;
pub mod local;
pub mod notify;
pub mod persist;
pub mod reconcile;
pub mod remote;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{TimerEngine, TimerPhase, TimerSnapshot};
pub use local::{FileStorage, LocalStorage, MemoryStorage};
pub use notify::Notification;
pub use remote::TimeStore;
pub use service::{spawn_timer_server, CommandReply, TimerAction, TimerHandle};
