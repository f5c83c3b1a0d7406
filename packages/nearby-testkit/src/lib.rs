mod engine;
mod error;
mod workspace;

pub use engine::{ScriptedEngine, candidate_north_of};
pub use error::{Error, Result};
pub use workspace::TestWorkspace;
