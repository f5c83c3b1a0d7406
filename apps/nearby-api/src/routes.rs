use std::{collections::HashMap, convert::Infallible};

use axum::{
	Json, Router,
	body::Body,
	extract::{Path, Query, State, rejection::JsonRejection},
	http::{
		HeaderName, StatusCode,
		header::{CACHE_CONTROL, CONTENT_TYPE},
	},
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::Serialize;
use serde_json::Value;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};

use nearby_domain::WeightSet;
use nearby_service::{LineStream, QueryRequest, ResultRecord, spawn_line_pump};
use nearby_storage::frames::{FrameEntry, FrameSequence};

use crate::state::AppState;

const NDJSON: &str = "application/x-ndjson";
const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/search/cafes", get(search_cafes))
		.route("/api/search/cafes/regular", get(search_cafes_regular))
		.route("/api/update/weights", put(update_weights))
		.route("/api/weights", get(current_weights))
		.route("/api/insert/cafes/{batch}", post(insert_cafes))
		.route("/api/insert/frames", get(list_insert_frames))
		.route("/api/insert/frames/count", get(count_insert_frames))
		.route("/api/insert/frames/{id}", get(insert_frame))
		.route("/api/search/frames", get(list_search_frames))
		.route("/api/search/frames/count", get(count_search_frames))
		.route("/api/search/frames/{id}", get(search_frame))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// Streams matches as NDJSON while the engine is still searching. A failure before the first
/// match is answered with a plain 500; a later one ends the body with a single error line.
async fn search_cafes(
	State(state): State<AppState>,
	Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
	let request =
		QueryRequest::from_params(&params, state.service.cfg.scoring.default_min_score)?;
	let query = state.service.search_stream(request)?;
	// The pump owns the query, so a client leaving during the wait cancels and joins the worker.
	let LineStream { first, lines, .. } = spawn_line_pump(query, state.service.bridge.capacity());

	match first.await {
		Ok(first) => first?,
		Err(_) => {
			return Err(json_error(
				StatusCode::INTERNAL_SERVER_ERROR,
				"internal",
				"Streaming pump stopped before the first result.",
			));
		},
	}

	let body = Body::from_stream(ReceiverStream::new(lines).map(Ok::<_, Infallible>));
	let headers = [
		(CONTENT_TYPE, NDJSON),
		(CACHE_CONTROL, "no-cache"),
		(HeaderName::from_static(X_ACCEL_BUFFERING), "no"),
	];

	Ok((headers, body).into_response())
}

async fn search_cafes_regular(
	State(state): State<AppState>,
	Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ResultRecord>>, ApiError> {
	let request =
		QueryRequest::from_params(&params, state.service.cfg.scoring.default_min_score)?;
	let response = state.service.search_batch(request).await?;

	Ok(Json(response))
}

async fn update_weights(
	State(state): State<AppState>,
	payload: Result<Json<WeightSet>, JsonRejection>,
) -> Result<Json<StatusBody>, ApiError> {
	let Json(weights) = payload.map_err(|err| {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text())
	})?;

	state.service.update_weights(weights);

	Ok(Json(StatusBody::success(None)))
}

async fn current_weights(State(state): State<AppState>) -> Json<WeightSet> {
	Json(state.service.current_weights().as_ref().clone())
}

async fn insert_cafes(
	State(state): State<AppState>,
	Path(batch): Path<u64>,
) -> Result<(StatusCode, Json<StatusBody>), ApiError> {
	let report = state.service.insert_cafes(batch).await?;

	Ok((StatusCode::CREATED, Json(StatusBody::success(Some(report.message())))))
}

async fn insert_frame(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
	let response = state.service.insert_frame(id).await?;

	Ok(Json(response))
}

async fn search_frame(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
	let response = state.service.search_frame(id).await?;

	Ok(Json(response))
}

async fn list_insert_frames(
	State(state): State<AppState>,
) -> Result<Json<Vec<FrameEntry>>, ApiError> {
	list_frames(&state, FrameSequence::Insert).await
}

async fn count_insert_frames(State(state): State<AppState>) -> Result<Json<CountBody>, ApiError> {
	count_frames(&state, FrameSequence::Insert).await
}

async fn list_search_frames(
	State(state): State<AppState>,
) -> Result<Json<Vec<FrameEntry>>, ApiError> {
	list_frames(&state, FrameSequence::Search).await
}

async fn count_search_frames(State(state): State<AppState>) -> Result<Json<CountBody>, ApiError> {
	count_frames(&state, FrameSequence::Search).await
}

async fn list_frames(
	state: &AppState,
	sequence: FrameSequence,
) -> Result<Json<Vec<FrameEntry>>, ApiError> {
	let response = state.service.list_frames(sequence).await?;

	Ok(Json(response))
}

async fn count_frames(
	state: &AppState,
	sequence: FrameSequence,
) -> Result<Json<CountBody>, ApiError> {
	let count = state.service.frame_count(sequence).await?;

	Ok(Json(CountBody { count }))
}

#[derive(Debug, Serialize)]
struct CountBody {
	count: usize,
}

#[derive(Debug, Serialize)]
struct StatusBody {
	status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	message: Option<String>,
}
impl StatusBody {
	fn success(message: Option<String>) -> Self {
		Self { status: "success", message }
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	error: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<nearby_service::Error> for ApiError {
	fn from(err: nearby_service::Error) -> Self {
		use nearby_service::Error;

		let (status, code) = match &err {
			Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			Error::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
			Error::Engine { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "search_failed"),
			Error::Ingest { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "ingest_failed"),
			Error::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
		};
		// CSV failures keep their "Error processing CSV" prefix on the wire.
		let message = match &err {
			Error::Ingest { .. } => err.to_string(),
			_ => err.message().to_string(),
		};

		json_error(status, code, message)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, error: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}
