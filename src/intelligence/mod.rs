pub mod scorer;

pub use scorer::{aggregate_confidence, meets_threshold};
