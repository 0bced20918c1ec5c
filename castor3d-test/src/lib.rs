mod helpers;
mod runner;

pub use helpers::*;
pub use runner::{TestRunner, TestRunnerBuilder};
