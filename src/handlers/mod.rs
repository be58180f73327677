mod health;
pub mod records;

pub use health::{health_check, readiness_check, stats};
pub use records::publish_records;
