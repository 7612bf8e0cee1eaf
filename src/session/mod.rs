pub mod commands;
pub mod controller;
pub mod question;
pub mod setup;
pub mod state;

pub use controller::SessionController;
pub use question::Question;
pub use setup::TestSetup;
pub use state::{SessionSnapshot, SessionState, SessionStatus, TimerMode};
