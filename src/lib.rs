pub mod carousel;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod interaction;
pub mod progress;
pub mod scheduler;
pub mod state;
pub mod timer;
pub mod tasks {
    pub mod engine;
    pub mod performance;
}
