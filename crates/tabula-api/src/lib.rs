pub mod catalog;
pub mod data;
pub mod error;
pub mod forms;
pub mod middleware;
pub mod readers;
pub mod records;
pub mod routes;
pub mod state;
pub mod tables;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
