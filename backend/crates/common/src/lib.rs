pub mod error;
pub mod types;

pub use error::{PulseError, PulseResult};
pub use types::{Commit, PrStatus, PullRequest, Story, UNASSIGNED};
