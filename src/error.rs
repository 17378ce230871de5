//! Error types shared by the ingestion, admission and processing paths.

use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::media::Step;
use crate::proto::Code;
use crate::Job;

/// Rejection from [`AdmissionQueue::try_enqueue`](crate::queue::AdmissionQueue::try_enqueue).
///
/// The job is handed back to the caller untouched.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("admission queue is full")]
    Full(Job),

    #[error("admission queue is closed")]
    Closed(Job),
}

/// Failures of one upload session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create {path:?}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("write error: {0}")]
    Write(#[source] io::Error),

    #[error("failed to finalize upload: {0}")]
    Finalize(#[source] io::Error),

    #[error("stream error: {0}")]
    Transport(String),

    #[error("upload contained no data")]
    Empty,

    #[error("upload session is closed")]
    Closed,

    #[error("server busy, queue full")]
    QueueFull,

    #[error("server shutting down, queue closed")]
    QueueClosed,
}

impl SessionError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Wire status reported to the uploader.
    pub fn code(&self) -> Code {
        match self {
            SessionError::QueueFull | SessionError::QueueClosed => Code::ResourceExhausted,
            SessionError::Create { .. }
            | SessionError::Write(_)
            | SessionError::Finalize(_)
            | SessionError::Closed => Code::Internal,
            SessionError::Transport(_) => Code::Unknown,
            SessionError::Empty => Code::InvalidArgument,
        }
    }

    /// True when the upload was refused for capacity, not because it failed.
    pub fn is_rejection(&self) -> bool {
        self.code() == Code::ResourceExhausted
    }
}

/// Result type for transcoder invocations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Failures of the external transcoder.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{step} generation could not start: {source}")]
    Spawn { step: Step, source: io::Error },

    #[error("{step} generation failed (exit code {exit_code:?}): {stderr}")]
    Failed {
        step: Step,
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl MediaError {
    pub fn step(&self) -> Step {
        match self {
            MediaError::Spawn { step, .. } | MediaError::Failed { step, .. } => *step,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the HTTP surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Session(err) => match err.code() {
                Code::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,
                Code::InvalidArgument | Code::Unknown => StatusCode::BAD_REQUEST,
                Code::Ok | Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> Code {
        match self {
            ApiError::BadRequest(_) => Code::InvalidArgument,
            ApiError::Internal(_) => Code::Internal,
            ApiError::Session(err) => err.code(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.to_string(),
            code: self.code().as_str_name(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_rejections_are_resource_exhausted() {
        assert_eq!(SessionError::QueueFull.code(), Code::ResourceExhausted);
        assert_eq!(SessionError::QueueClosed.code(), Code::ResourceExhausted);
        assert!(SessionError::QueueFull.is_rejection());
    }

    #[test]
    fn failures_are_distinct_from_rejections() {
        let write = SessionError::Write(io::Error::other("disk full"));
        assert_eq!(write.code(), Code::Internal);
        assert!(!write.is_rejection());

        let transport = SessionError::transport("reset by peer");
        assert_eq!(transport.code(), Code::Unknown);
        assert_eq!(SessionError::Empty.code(), Code::InvalidArgument);
        assert_eq!(SessionError::Closed.code(), Code::Internal);
        assert!(!SessionError::Closed.is_rejection());
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(
            ApiError::from(SessionError::QueueFull).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(SessionError::Finalize(io::Error::other("x"))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(SessionError::Empty).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::bad_request("missing field").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn media_error_reports_step() {
        let err = MediaError::Failed {
            step: Step::Thumbnail,
            exit_code: Some(1),
            stderr: String::new(),
        };
        assert_eq!(err.step(), Step::Thumbnail);
    }
}
