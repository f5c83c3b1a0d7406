pub mod cafes;
pub mod engine;
pub mod frames;
pub mod memory;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
