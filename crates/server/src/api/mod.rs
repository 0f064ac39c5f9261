pub mod convert;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod presets;
pub mod routes;
pub mod upload;

pub use error::{ApiError, ErrorBody, NODE_VERSION};
pub use routes::create_router;
