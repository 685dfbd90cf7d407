//! Tabbed task lists with a JSON save file and a daily sweep of finished work.

pub mod board;
pub mod clock;
pub mod input;
pub mod persist;
pub mod rollover;
pub mod session;
pub mod settings;

pub use board::{Board, BoardError, Category, Command, Event, TaskFields, TaskRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use persist::{SaveFileError, TaskFile};
pub use rollover::Rollover;
pub use session::{Session, SessionError};
pub use settings::{Settings, SettingsError};
