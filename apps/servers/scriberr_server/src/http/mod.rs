mod error;
mod routes;
mod serve;
mod srt;

pub use error::{Error, ResultExt};
pub use serve::{api_router, serve, AppState};

pub type Result<T, E = Error> = std::result::Result<T, E>;
