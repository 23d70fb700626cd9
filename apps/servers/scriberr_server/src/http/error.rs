use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use csv_batch::BatchError;
use job_store::StoreError;
use sqlx::error::DatabaseError;
use task_queue::QueueError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("{0}")]
	Validation(String),

	#[error("request path not found")]
	NotFound,

	#[error("{0}")]
	Conflict(String),

	#[error("an error occurred with the database")]
	Sqlx(#[from] sqlx::Error),

	#[error("an internal server error occurred")]
	Anyhow(#[from] anyhow::Error),
}

impl From<StoreError> for Error {
	fn from(error: StoreError) -> Self {
		match error {
			StoreError::NotFound => Self::NotFound,
			StoreError::Stale { expected, actual } => Self::Conflict(format!("expected status `{expected}`, found `{actual}`")),
			StoreError::Sqlx(e) => Self::Sqlx(e),
			StoreError::Json(e) => Self::Anyhow(e.into()),
		}
	}
}

impl From<QueueError> for Error {
	fn from(error: QueueError) -> Self {
		match error {
			QueueError::InvalidState { job_id, actual } => Self::Conflict(format!("job {job_id} cannot be submitted from status `{actual}`")),
			QueueError::NotFound => Self::NotFound,
			QueueError::Store(e) => e.into(),
		}
	}
}

impl From<BatchError> for Error {
	fn from(error: BatchError) -> Self {
		match error {
			BatchError::NotFound => Self::NotFound,
			BatchError::AlreadyRunning | BatchError::AlreadyCompleted => Self::Conflict(error.to_string()),
			BatchError::NoValidRows => Self::Validation(error.to_string()),
			BatchError::Store(e) => e.into(),
			other => Self::Anyhow(anyhow::anyhow!(other)),
		}
	}
}

impl Error {
	const fn status_code(&self) -> StatusCode {
		match self {
			Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
			Self::NotFound => StatusCode::NOT_FOUND,
			Self::Conflict(_) => StatusCode::CONFLICT,
			Self::Sqlx(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::Sqlx(ref e) => {
				tracing::error!("SQLx error: {:?}", e);
			}
			Self::Anyhow(ref e) => {
				tracing::error!("Generic error: {:?}", e);
			}
			_ => (),
		}

		(self.status_code(), self.to_string()).into_response()
	}
}

pub trait ResultExt<T> {
	/// Map a unique/constraint violation onto a domain error; everything
	/// else converts as usual.
	fn on_constraint(self, name: &str, map_err: impl FnOnce(Box<dyn DatabaseError>) -> Error) -> Result<T, Error>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
	E: Into<Error>,
{
	fn on_constraint(self, name: &str, map_err: impl FnOnce(Box<dyn DatabaseError>) -> Error) -> Result<T, Error> {
		self.map_err(|e| match e.into() {
			Error::Sqlx(sqlx::Error::Database(dbe)) if dbe.constraint() == Some(name) || dbe.message().contains(name) => map_err(dbe),
			e => e,
		})
	}
}
