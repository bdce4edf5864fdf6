// Axum API Server Module
//
// Purpose: JSON API for crop recommendation, advisories, market prices,
// weather and chat, plus the dashboard pages under crate::web.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::chatbot::{generate_crop_response, ChatContext, ChatProviders, ChatTurn};
use crate::config::Settings;
use crate::data::crop_guide::CropGuide;
use crate::data::lookup::{get_npk_for_region, get_water_info};
use crate::data::soil_profiles::SoilProfileTable;
use crate::data::{SoilReadings, SoilSample};
use crate::error::AdvisorError;
use crate::model::{load_pipeline, CropDiseaseClassifier, CropPredictor, YieldEstimator};
use crate::recommendation::{
    diagnose_disease, predict_yield, recommend_crops, recommend_fertilizer, recommend_pesticide, regional_shortlist,
    supported_diseases,
};
use crate::services::{MarketPriceService, WeatherError, WeatherService};
use crate::web;

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// `None` until a model has been trained
    pub predictor: Option<Arc<CropPredictor>>,
    pub crop_guide: Arc<CropGuide>,
    pub soil_profiles: Arc<SoilProfileTable>,
    pub yield_estimator: YieldEstimator,
    pub disease_classifier: Arc<CropDiseaseClassifier>,
    pub market: MarketPriceService,
    pub weather: WeatherService,
    pub chat: ChatContext,
    pub chat_providers: ChatProviders,
    pub cache: Cache<String, Value>,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let paths = settings.paths();

        tracing::info!("Loading crop recommendation model...");
        let model_paths = paths.clone();
        let top_k = settings.top_k;
        let predictor = match tokio::task::spawn_blocking(move || load_pipeline(&model_paths)).await? {
            Ok(pipeline) => Some(Arc::new(CropPredictor::new(pipeline, top_k))),
            Err(e) => {
                tracing::warn!("Recommendation model unavailable, serving without it: {}", e);
                None
            }
        };

        tracing::info!("Loading crop guide and soil profiles...");
        let guide_paths = paths.clone();
        let (crop_guide, soil_profiles) = tokio::task::spawn_blocking(move || {
            (
                CropGuide::load(&guide_paths),
                SoilProfileTable::load(&guide_paths.crop_dataset()),
            )
        })
        .await?;
        let crop_guide = Arc::new(crop_guide);

        tracing::info!("Loading chat context...");
        let chat_paths = paths.clone();
        let chat_guide = crop_guide.clone();
        let chat = tokio::task::spawn_blocking(move || ChatContext::from_guide(&chat_paths, chat_guide)).await?;

        tracing::info!("Initializing Moka cache...");
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(settings.response_cache_ttl)
            .build();

        Ok(Self {
            predictor,
            crop_guide,
            soil_profiles: Arc::new(soil_profiles),
            yield_estimator: YieldEstimator::new(),
            disease_classifier: Arc::new(CropDiseaseClassifier::new()),
            market: MarketPriceService::new(&settings.market_api_key, settings.market_cache_ttl),
            weather: WeatherService::new(settings.openweather_api_key.clone(), settings.weather_cache_ttl),
            chat,
            chat_providers: ChatProviders::from_settings(&settings),
            cache,
            settings: Arc::new(settings),
        })
    }

    pub fn model_ready(&self) -> bool {
        self.predictor.is_some()
    }

    pub(crate) fn require_predictor(&self) -> Result<Arc<CropPredictor>, AppError> {
        self.predictor
            .clone()
            .ok_or_else(|| AppError::ModelNotReady(AdvisorError::ModelNotReady.to_string()))
    }
}

// ============================================================================
// Router Configuration
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Recommendation and soil data
        .route("/api/recommend", post(recommend))
        .route("/api/regions/:region/npk", get(region_npk))
        .route("/api/regions/:region/recommendations", get(region_recommendations))
        .route("/api/soil-profiles", get(list_soil_profiles))
        .route("/api/soil-profiles/:key", get(get_soil_profile))
        // Advisories
        .route("/api/fertilizer", post(fertilizer_plan))
        .route("/api/pesticide", post(pesticide_plan))
        .route("/api/pesticide/diseases", get(list_diseases))
        .route("/api/disease/diagnose", post(diagnose))
        .route("/api/yield", post(yield_projection))
        .route("/api/crops/:name", get(get_crop_details))
        .route("/api/water/:crop", get(water_info))
        // External services
        .route("/api/market", get(all_market_prices))
        .route("/api/market/refresh", post(refresh_market))
        .route("/api/market/:crop", get(market_price))
        .route("/api/weather/:location", get(weather_snapshot))
        .route("/api/chat", post(chat))
        // Dashboard pages
        .merge(web::page_routes())
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "model_ready": state.model_ready(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[derive(Deserialize)]
struct RecommendRequest {
    #[serde(flatten)]
    sample: SoilSample,
    /// Replace temperature, humidity and rainfall with current weather
    location: Option<String>,
}

async fn recommend(
    State(state): State<AppState>,
    Json(payload): Json<RecommendRequest>,
) -> Result<Json<Value>, AppError> {
    let mut sample = payload.sample;
    sample.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let predictor = state.require_predictor()?;

    if let Some(location) = payload.location.as_deref().filter(|l| !l.trim().is_empty()) {
        match state.weather.get_weather_snapshot(location, true).await {
            Ok(snapshot) => snapshot.apply_to(&mut sample),
            Err(e) => tracing::warn!("Weather override skipped for {}: {}", location, e),
        }
    }

    let result = cached_recommendation(&state, predictor, sample).await?;
    Ok(Json(result))
}

/// Run the predictor off the async runtime, memoized per exact sample
///
/// Samples are validated first, so only finite in-range readings reach the
/// cache key.
pub(crate) async fn cached_recommendation(
    state: &AppState,
    predictor: Arc<CropPredictor>,
    sample: SoilSample,
) -> Result<Value, AppError> {
    sample.validate().map_err(|e| AppError::BadRequest(e.to_string()))?;
    let cache_key = format!("recommend:{}", serde_json::to_string(&sample).unwrap_or_default());
    if let Some(cached) = state.cache.get(&cache_key).await {
        tracing::debug!("Cache hit for {}", cache_key);
        return Ok(cached);
    }

    let response = tokio::task::spawn_blocking(move || recommend_crops(&predictor, &sample))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let result = serde_json::to_value(&response)
        .map_err(|e| AppError::Internal(format!("JSON serialization error: {}", e)))?;
    state.cache.insert(cache_key, result.clone()).await;

    Ok(result)
}

async fn region_npk(Path(region): Path<String>) -> Result<Json<Value>, AppError> {
    let npk = get_npk_for_region(&region)
        .ok_or_else(|| AppError::NotFound(format!("No NPK reference for region {}", region)))?;
    Ok(Json(json!({ "region": npk.region, "npk": npk })))
}

async fn region_recommendations(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> Result<Json<Value>, AppError> {
    if region.trim().is_empty() {
        return Err(AppError::BadRequest("Region must not be empty".to_string()));
    }
    let predictor = state.require_predictor()?;

    let shortlist = tokio::task::spawn_blocking(move || regional_shortlist(&predictor, &region))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Json(json!(shortlist)))
}

async fn list_soil_profiles(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "rows": state.soil_profiles.options().len(),
        "options": state.soil_profiles.options(),
    }))
}

async fn get_soil_profile(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, AppError> {
    let profile = state
        .soil_profiles
        .get(&key)
        .ok_or_else(|| AppError::NotFound(format!("Soil profile {} not found", key)))?;
    Ok(Json(json!(profile)))
}

#[derive(Deserialize)]
struct CropReadingsRequest {
    crop: String,
    #[serde(flatten)]
    readings: SoilReadings,
}

async fn fertilizer_plan(Json(payload): Json<CropReadingsRequest>) -> Result<Json<Value>, AppError> {
    if payload.crop.trim().is_empty() {
        return Err(AppError::BadRequest("crop is required".to_string()));
    }
    let plan = recommend_fertilizer(&payload.crop, &payload.readings);
    Ok(Json(json!({ "crop": payload.crop, "plan": plan })))
}

#[derive(Deserialize)]
struct PesticideRequest {
    disease: String,
    severity: Option<String>,
}

async fn pesticide_plan(Json(payload): Json<PesticideRequest>) -> Json<Value> {
    Json(json!(recommend_pesticide(&payload.disease, payload.severity.as_deref())))
}

async fn list_diseases() -> Json<Value> {
    Json(json!({ "diseases": supported_diseases() }))
}

#[derive(Deserialize)]
struct DiagnoseParams {
    crop: Option<String>,
}

async fn diagnose(
    State(state): State<AppState>,
    Query(params): Query<DiagnoseParams>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Request body must contain a leaf image".to_string()));
    }
    let crop = params.crop.unwrap_or_else(|| "crop".to_string());
    let classifier = state.disease_classifier.clone();

    let diagnosis = tokio::task::spawn_blocking(move || diagnose_disease(&classifier, &crop, &body))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
        .map_err(|e| AppError::BadRequest(format!("Could not read image: {}", e)))?;

    let plan = recommend_pesticide(&diagnosis.disease, Some(&diagnosis.severity));
    Ok(Json(json!({ "diagnosis": diagnosis, "treatment": plan })))
}

#[derive(Deserialize)]
struct YieldRequest {
    crop: String,
    state: Option<String>,
    #[serde(flatten)]
    readings: SoilReadings,
}

async fn yield_projection(
    State(state): State<AppState>,
    Json(payload): Json<YieldRequest>,
) -> Result<Json<Value>, AppError> {
    if payload.crop.trim().is_empty() {
        return Err(AppError::BadRequest("crop is required".to_string()));
    }
    let projection = predict_yield(&state.yield_estimator, &payload.crop, &payload.readings);
    let price = state.market.get_market_price(&payload.crop, payload.state.as_deref()).await;
    let revenue = projection.estimated_revenue(price.price);

    Ok(Json(json!({
        "projection": projection,
        "market_price": price,
        "estimated_revenue": revenue,
    })))
}

async fn get_crop_details(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let details = state
        .crop_guide
        .get(&name)
        .ok_or_else(|| AppError::NotFound(AdvisorError::UnknownCrop(name.clone()).to_string()))?;
    Ok(Json(json!(details)))
}

async fn water_info(State(state): State<AppState>, Path(crop): Path<String>) -> Json<Value> {
    let info = get_water_info(&crop, state.crop_guide.dataset_water_average(&crop));
    Json(json!(info))
}

async fn all_market_prices(State(state): State<AppState>) -> Json<Value> {
    let prices = state.market.get_all_crop_prices().await;
    Json(json!({ "rows": prices.len(), "prices": prices }))
}

#[derive(Deserialize)]
struct MarketParams {
    state: Option<String>,
}

async fn market_price(
    State(state): State<AppState>,
    Path(crop): Path<String>,
    Query(params): Query<MarketParams>,
) -> Json<Value> {
    let price = state.market.get_market_price(&crop, params.state.as_deref()).await;
    Json(json!({ "crop": crop, "price": price }))
}

async fn refresh_market(State(state): State<AppState>) -> Json<Value> {
    state.market.refresh_price_cache().await;
    Json(json!({ "status": "refreshed" }))
}

async fn weather_snapshot(
    State(state): State<AppState>,
    Path(location): Path<String>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state.weather.get_weather_snapshot(&location, true).await?;
    Ok(Json(json!(snapshot)))
}

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
    #[serde(default)]
    history: Vec<ChatTurn>,
}

async fn chat(State(state): State<AppState>, Json(payload): Json<ChatRequest>) -> Json<Value> {
    let ctx = state.chat.with_conversation(payload.history);
    let reply = generate_crop_response(&payload.query, &ctx, &state.chat_providers).await;
    Json(json!({
        "reply": reply,
        "html": web::render_markdown(&reply),
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    ModelNotReady(String),
    ServiceUnavailable(String),
    Upstream(String),
    Internal(String),
}

impl AppError {
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ModelNotReady(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::Upstream(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl From<WeatherError> for AppError {
    fn from(e: WeatherError) -> Self {
        match e {
            WeatherError::MissingApiKey => AppError::ServiceUnavailable(e.to_string()),
            WeatherError::EmptyLocation => AppError::BadRequest(e.to_string()),
            WeatherError::Request(_) | WeatherError::MissingFields(_) => AppError::Upstream(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ModelNotReady(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
