pub mod batches;
pub mod executions;
pub mod jobs;
pub mod model;
pub mod profiles;
pub mod schema;
pub mod speakers;
pub mod tracks;
