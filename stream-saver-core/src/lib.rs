pub mod bootstrap;
pub mod config;
pub mod crash;
pub mod error;
pub mod events;
pub mod layout;
pub mod logging;
pub mod poll;
pub mod processor;
pub mod session;
pub mod status;
pub mod token;
pub mod tool;

pub use config::Config;
pub use error::{Error, Result};
pub use events::{EventSink, RecorderEvent};
pub use poll::PollLoop;
pub use session::RecordingSession;
pub use status::{StatusChecker, StreamStatus};
pub use token::{TokenProvider, TokenStore};
pub use tool::{ExternalTool, ProcessTool};
