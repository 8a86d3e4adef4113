//! Batch orchestration
//!
//! The driver walks the configured entity list, acquiring a session
//! through credential rotation, fetching and storing each entity's
//! documents, and checkpointing progress so an interrupted run can be
//! resumed. A pause sentinel file and Ctrl-C both halt the loop cleanly
//! between entities.

mod driver;
mod entities;
mod progress;

pub use driver::{BatchDriver, BatchOptions, BatchStats};
pub use entities::{load_entities, Entity};
pub use progress::{Checkpoint, CheckpointStore, ErrorLog, PauseFlag};
