use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::ServingService;
use crate::error::ModelError;
use crate::models::RecommendationResponse;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

async fn health_check() -> Json<ApiResponse<HashMap<String, String>>> {
    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("service".to_string(), "svdrec".to_string());
    status.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());

    Json(ApiResponse::success(status))
}

async fn get_recommendations(
    State(service): State<Arc<ServingService>>,
    Path(user_id): Path<usize>,
    Query(params): Query<RecommendationQuery>,
) -> ApiResult<RecommendationResponse> {
    let count = params.count.unwrap_or(service.config().default_count);

    match service.recommend(user_id, count).await {
        Ok(response) => Ok(Json(ApiResponse::success(response))),
        Err(e) => {
            let status = match e.downcast_ref::<ModelError>() {
                Some(ModelError::UserOutOfRange { .. }) => StatusCode::NOT_FOUND,
                Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
                None => StatusCode::BAD_REQUEST,
            };
            let message = if status == StatusCode::NOT_FOUND {
                "Enter a valid user ID".to_string()
            } else {
                e.to_string()
            };
            tracing::warn!("Recommendation request for user {} failed: {}", user_id, e);
            Err((status, Json(ApiResponse::error(message))))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingResult {
    pub steps_run: usize,
    pub initial_loss: f64,
    pub final_loss: f64,
    pub initial_rmse: f64,
    pub final_rmse: f64,
}

async fn train(State(service): State<Arc<ServingService>>) -> ApiResult<TrainingResult> {
    match service.retrain().await {
        Ok(summary) => Ok(Json(ApiResponse::success(TrainingResult {
            steps_run: summary.steps_run,
            initial_loss: summary.initial_loss,
            final_loss: summary.final_loss,
            initial_rmse: summary.initial_rmse,
            final_rmse: summary.final_rmse,
        }))),
        Err(e) => {
            tracing::error!("Retraining failed: {:#}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            ))
        }
    }
}

async fn get_stats(State(service): State<Arc<ServingService>>) -> Json<ApiResponse<HashMap<String, u64>>> {
    Json(ApiResponse::success(service.stats()))
}

pub fn create_router(service: Arc<ServingService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/recommendations/:user_id", get(get_recommendations))
        .route("/stats", get(get_stats))
        .route("/train", post(train))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(service)
}
