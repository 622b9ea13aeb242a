pub mod frequency;
pub mod generator;

pub use frequency::analyze;
pub use generator::{historical_ranking, transition_prediction, Generator};
