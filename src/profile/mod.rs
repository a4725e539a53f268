//! The user record: demographics, assessment scores and goals.

pub mod bootstrap;
pub mod model;

pub use bootstrap::{load_or_create, resolve_username};
pub use model::{Culture, UserGoals, UserProfile};
