pub mod commands;
pub mod controller;
pub mod gamification;
pub mod pomodoro;
pub mod state;
pub mod task;

pub use controller::ProductivityController;
pub use gamification::GamificationState;
pub use pomodoro::{PomodoroSession, PomodoroSnapshot};
pub use state::{ProductivityState, Statistics, ToggleOutcome};
pub use task::{Difficulty, NewTask, Priority, ProductivityTask, TaskFilter, TaskKind};
