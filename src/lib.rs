pub mod collision;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod extract;
pub mod fsops;
pub mod jobs;
pub mod logging;
pub mod normalize;
pub mod organize;
pub mod prune;
pub mod scan;
pub mod split;
pub mod transfer;

pub use error::{OrganiseError, Result};
