use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError, Result as ActixResult};
use basketx_core::{
    Error as CoreError, ModelRegistry, RecommendationRequest, Recommendations, TrainingMetadata,
    DEFAULT_RECOMMENDATIONS,
};
use basketx_storage::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared by every worker: the served models and where to reload them from
#[derive(Clone)]
pub struct ApiState {
    registry: Arc<ModelRegistry>,
    store: Option<Arc<ArtifactStore>>,
}

impl ApiState {
    pub fn new(registry: Arc<ModelRegistry>, store: Option<Arc<ArtifactStore>>) -> Self {
        Self { registry, store }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("No artifact store configured")]
    NoStore,

    #[error("{0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NoStore => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

#[derive(Deserialize)]
struct RecommendQuery {
    n: Option<usize>,
}

#[derive(Serialize)]
struct ModelInfo {
    loaded: bool,
    products: usize,
    itemsets: usize,
    rules: usize,
    metadata: Option<TrainingMetadata>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(
        registry: Arc<ModelRegistry>,
        store: Option<Arc<ArtifactStore>>,
        port: u16,
    ) -> std::io::Result<()> {
        let state = ApiState::new(registry, store);
        tracing::info!(port, "starting REST API");

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(state.clone()))
                .configure(Self::configure)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }

    /// Routes and extractor settings, without state or middleware
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
            ApiError::BadRequest(err.to_string()).into()
        }))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| {
            ApiError::BadRequest(err.to_string()).into()
        }))
        .route("/health", web::get().to(health))
        .route("/models", web::get().to(model_info))
        .route("/models/reload", web::post().to(reload_models))
        .route("/recommend", web::post().to(recommend_batch))
        .route("/recommend/", web::post().to(recommend_batch))
        .route("/recommend/{product_id}", web::get().to(recommend_similar));
    }
}

async fn health(state: web::Data<ApiState>) -> ActixResult<HttpResponse> {
    let snapshot = state.registry.snapshot();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "models_loaded": !snapshot.is_empty(),
    })))
}

async fn model_info(state: web::Data<ApiState>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(info(&state.registry)))
}

fn info(registry: &ModelRegistry) -> ModelInfo {
    let snapshot = registry.snapshot();
    ModelInfo {
        loaded: !snapshot.is_empty(),
        products: snapshot.similarity.dim(),
        itemsets: snapshot.rules.itemsets().len(),
        rules: snapshot.rules.len(),
        metadata: snapshot.metadata.clone(),
    }
}

async fn reload_models(state: web::Data<ApiState>) -> Result<HttpResponse, ApiError> {
    let store = state.store.clone().ok_or(ApiError::NoStore)?;

    let loaded = web::block(move || store.load())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let snapshot = loaded.map_err(|e| {
        tracing::error!(error = %e, "model reload failed, keeping current models");
        ApiError::Internal(e.to_string())
    })?;

    state.registry.reload(snapshot);
    Ok(HttpResponse::Ok().json(info(&state.registry)))
}

async fn recommend_similar(
    state: web::Data<ApiState>,
    path: web::Path<String>,
    query: web::Query<RecommendQuery>,
) -> Result<HttpResponse, ApiError> {
    let product_id = path.into_inner();
    let n = query.n.unwrap_or(DEFAULT_RECOMMENDATIONS);

    let recommendations = state
        .registry
        .snapshot()
        .similar_products(&product_id, n)
        .map_err(|e| match e {
            CoreError::ProductNotFound(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        })?;

    Ok(HttpResponse::Ok().json(Recommendations {
        product_id,
        recommendations,
    }))
}

async fn recommend_batch(
    state: web::Data<ApiState>,
    req: web::Json<Vec<RecommendationRequest>>,
) -> ActixResult<HttpResponse> {
    let results = state.registry.snapshot().batch_rule_recommendations(&req);
    tracing::debug!(requested = req.len(), answered = results.len(), "batch recommendation");
    Ok(HttpResponse::Ok().json(results))
}
