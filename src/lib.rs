pub mod channel;
pub mod domains;
pub mod engine;
pub mod error;
pub mod heap;
pub mod node;
pub mod problem;
pub mod state;
pub mod stats;

pub use engine::{Engine, Solution};
pub use error::{EngineError, InstanceError};
pub use problem::Problem;
pub use stats::{EngineStats, WorkerSnapshot};
