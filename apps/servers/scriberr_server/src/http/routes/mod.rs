pub mod batches;
pub mod events;
pub mod health;
pub mod jobs;
pub mod profiles;
