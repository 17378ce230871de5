//! HTTP surface: video listing, form uploads and static files.

use std::path::Path;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::{ApiError, ApiResult, SessionError};
use crate::session::WEB_PREFIX;
use crate::state::AppState;

/// Multipart field carrying the uploaded video.
const VIDEO_FIELD: &str = "video";

/// Create the HTTP router.
///
/// `/uploads/*` serves the storage root; every other unmatched path is
/// served from `static_dir`.
pub fn router(state: AppState, static_dir: &Path, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route("/videos", get(list_videos))
        .route("/upload", post(upload_video))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(state.store.root()))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /api/videos - names of stored source videos
async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let videos = state.store.list_videos().await.map_err(|err| {
        error!(message = "Failed to read uploads", error = %err);
        ApiError::internal("Failed to read uploads")
    })?;

    Ok(Json(videos))
}

/// POST /api/upload - store a form upload and try to admit it
async fn upload_video(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<&'static str> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Invalid multipart body: {err}")))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let mut session = state.session(WEB_PREFIX);

        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => session.receive(&filename, &chunk).await?,
                Ok(None) => break,
                Err(err) => {
                    let err = SessionError::transport(err.to_string());
                    session.abort(&err);
                    return Err(err.into());
                }
            }
        }

        session.finish().await?;
        return Ok("Upload successful");
    }

    Err(ApiError::bad_request(format!("Missing form field `{VIDEO_FIELD}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::AdmissionQueue;
    use crate::storage::MediaStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "mediaq-test-boundary";

    fn app(capacity: usize) -> (TempDir, AppState, Router) {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let state = AppState::new(MediaStore::new(temp.path()), AdmissionQueue::new(capacity));
        let router = router(state.clone(), &temp.path().join("static"), 1024 * 1024);
        (temp, state, router)
    }

    fn multipart_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: video/mp4\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn upload_is_admitted() {
        let (_temp, state, router) = app(2);

        let response = router
            .oneshot(multipart_request("video", "holiday.mp4", b"movie-bytes"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"Upload successful");

        let job = state.queue.dequeue().await.unwrap();
        assert_eq!(job.video_id, "video_web_holiday.mp4");
        assert_eq!(std::fs::read(&job.filename).unwrap(), b"movie-bytes");
    }

    #[tokio::test]
    async fn full_queue_returns_503_and_removes_file() {
        let (_temp, state, router) = app(1);

        let first = router
            .clone()
            .oneshot(multipart_request("video", "a.mp4", b"a"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router
            .oneshot(multipart_request("video", "b.mp4", b"b"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!state.store.source_path("video_web_b.mp4").exists());
        assert_eq!(state.queue.len(), 1);
    }

    #[tokio::test]
    async fn missing_field_is_bad_request() {
        let (_temp, state, router) = app(1);

        let response = router
            .oneshot(multipart_request("document", "a.mp4", b"a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn lists_stored_videos() {
        let (temp, _state, router) = app(1);
        std::fs::write(temp.path().join("video_a.mp4"), b"a").unwrap();
        std::fs::write(temp.path().join("video_a.mp4_preview.gif"), b"g").unwrap();

        let response = router
            .oneshot(Request::get("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let videos: Vec<String> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(videos, ["video_a.mp4"]);
    }

    #[tokio::test]
    async fn serves_uploaded_files() {
        let (temp, _state, router) = app(1);
        std::fs::write(temp.path().join("video_a.mp4_thumbnail.jpg"), b"jpeg").unwrap();

        let response = router
            .oneshot(
                Request::get("/uploads/video_a.mp4_thumbnail.jpg")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"jpeg");
    }
}
