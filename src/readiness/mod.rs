// Page readiness: folds every tracked resource's terminal outcome into one ready signal.

pub mod progress;
pub mod tracker;
pub mod traits;
