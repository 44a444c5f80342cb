pub mod run;

pub use run::{run_once, ChainFailure, ChainOutcome, RunOptions, RunReport};
