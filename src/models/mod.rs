mod api;
mod batch;

pub use api::{HealthResponse, StatsResponse};
pub use batch::{BatchRequest, Record};
