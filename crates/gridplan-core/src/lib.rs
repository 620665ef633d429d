pub mod engine;
pub mod error;
pub mod feed;
pub mod keys;
pub mod media;
pub mod model;
pub mod overlay;
pub mod persistence;
pub mod schedule;
pub mod store;

pub use engine::Planner;
pub use error::{PlanError, Result};
pub use keys::{DateKey, MonthKey};
pub use model::{MediaHandle, Post, PostId, PostInput, PostPatch, PostType};
