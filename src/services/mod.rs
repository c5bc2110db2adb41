pub mod dispatch;
pub mod ranking;
pub mod ratings;
pub mod sessions;
pub mod store;

pub use dispatch::{ComparisonDispatcher, DispatcherHandle};
pub use ranking::RatingEngine;
pub use sessions::SessionManager;
