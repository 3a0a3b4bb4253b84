pub mod classifier;
pub mod error;
pub mod gate;
pub mod hooks;
pub mod io;
pub mod lifecycle;
pub mod mode;
pub mod outcome;
pub mod paths;
pub mod policy;
pub mod settings;
pub mod state;
pub mod transition;
pub mod types;

pub use error::{RedgreenError, Result};
