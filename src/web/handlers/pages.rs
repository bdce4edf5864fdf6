// Page handlers for HTML rendering with Askama
//
// Every page is a plain form round-trip: values the farmer entered come back
// in the response, and the chat history travels in a hidden field.

use askama::Template;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    Form,
};
use serde::{Deserialize, Deserializer};

use crate::api_server::{cached_recommendation, AppState};
use crate::chatbot::{generate_crop_response, ChatTurn};
use crate::data::lookup::{get_npk_for_region, get_water_info, npk_regions, WaterInfo};
use crate::data::soil_profiles::{SoilOption, DEFAULT_HUMIDITY, DEFAULT_RAINFALL, DEFAULT_TEMPERATURE};
use crate::data::{SoilReadings, SoilSample};
use crate::model::TrainingMetrics;
use crate::recommendation::{
    display_percentages, predict_yield, recommend_fertilizer, recommend_pesticide, suitability_labels,
    supported_diseases, CropRecommendationResponse, FertilizerPlanItem, PesticidePlan,
};
use crate::web::i18n::Lang;
use crate::web::render_markdown;

fn render<T: Template>(template: &T) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| format!("Template error: {}", e)))
}

/// Empty form inputs arrive as `""`; treat them as absent
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn rupees(value: f64) -> String {
    format!("₹{:.0}", value)
}

/// `?lang=` on pages without another query
#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

impl LangQuery {
    fn lang(&self) -> Lang {
        Lang::from_code(self.lang.as_deref())
    }
}

const SEVERITY_LEVELS: [&str; 3] = ["Low", "Medium", "High"];

// ============================================================================
// Home Page
// ============================================================================

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub title: String,
    pub lang: Lang,
    pub path: &'static str,
    pub model_ready: bool,
    pub soil_options: Vec<SoilOption>,
    pub regions: Vec<&'static str>,
    pub default_temperature: f64,
    pub default_humidity: f64,
    pub default_rainfall: f64,
    pub diseases: Vec<String>,
    pub severities: [&'static str; 3],
}

pub async fn home_page(State(state): State<AppState>, Query(query): Query<LangQuery>) -> impl IntoResponse {
    let lang = query.lang();
    let template = HomeTemplate {
        title: lang.text("crop_recommendation").to_string(),
        lang,
        path: "/",
        model_ready: state.model_ready(),
        soil_options: state.soil_profiles.options().to_vec(),
        regions: npk_regions().collect(),
        default_temperature: DEFAULT_TEMPERATURE,
        default_humidity: DEFAULT_HUMIDITY,
        default_rainfall: DEFAULT_RAINFALL,
        diseases: supported_diseases(),
        severities: SEVERITY_LEVELS,
    };
    render(&template)
}

// ============================================================================
// Recommendation Results
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RecommendForm {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub n: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub p: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub k: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub ph: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub rainfall: Option<f64>,
    pub soil_profile: Option<String>,
    pub region: Option<String>,
    pub location: Option<String>,
    pub lang: Option<String>,
}

/// Form values first, then the chosen soil profile, then the region's NPK
/// reference; climate falls back to seasonal defaults
pub fn resolve_sample(form: &RecommendForm, state: &AppState) -> Result<SoilSample, String> {
    let profile = non_blank(form.soil_profile.clone()).and_then(|key| state.soil_profiles.get(&key).cloned());
    let region = non_blank(form.region.clone());
    let region_npk = region.as_deref().and_then(get_npk_for_region);

    let n = form.n.or(profile.as_ref().map(|p| p.n)).or(region_npk.map(|r| r.n));
    let p = form.p.or(profile.as_ref().map(|p| p.p)).or(region_npk.map(|r| r.p));
    let k = form.k.or(profile.as_ref().map(|p| p.k)).or(region_npk.map(|r| r.k));
    let ph = form.ph.or(profile.as_ref().map(|p| p.ph));

    let (Some(n), Some(p), Some(k), Some(ph)) = (n, p, k, ph) else {
        return Err("Enter N, P, K and pH, or pick a soil profile to fill them in.".to_string());
    };
    let temperature = form
        .temperature
        .or(profile.as_ref().map(|p| p.temperature))
        .unwrap_or(DEFAULT_TEMPERATURE);
    let humidity = form
        .humidity
        .or(profile.as_ref().map(|p| p.humidity))
        .unwrap_or(DEFAULT_HUMIDITY);
    let rainfall = form
        .rainfall
        .or(profile.as_ref().map(|p| p.rainfall))
        .unwrap_or(DEFAULT_RAINFALL);

    let sample = SoilSample::from_features([n, p, k, temperature, humidity, ph, rainfall], region);
    sample.validate().map_err(|e| e.to_string())?;
    Ok(sample)
}

/// Dataset averages carry no irrigation count, so the clause is left out
fn irrigation_cycles(water: &WaterInfo) -> Option<String> {
    (water.source != "dataset").then(|| water.cycles.clone())
}

pub struct RecommendationRow {
    pub name: String,
    pub percent: u32,
    pub label: &'static str,
    pub rationale: String,
    pub water_mm: String,
    /// `None` when the seasonal total comes from the dataset average
    pub water_cycles: Option<String>,
    pub water_stage: String,
    pub price: String,
    pub price_source: String,
    pub trend: String,
    pub yield_level: String,
    pub yield_output: String,
    pub revenue: String,
}

#[derive(Template)]
#[template(path = "pages/recommend.html")]
pub struct RecommendTemplate {
    pub title: String,
    pub lang: Lang,
    pub path: &'static str,
    pub error: Option<String>,
    pub notices: Vec<String>,
    pub inputs: Vec<(&'static str, String)>,
    pub rows: Vec<RecommendationRow>,
    pub soil_tips: Vec<String>,
    pub weather_notes: Vec<String>,
    pub top_crop: String,
    pub fertilizer_plan: Vec<FertilizerPlanItem>,
}

impl RecommendTemplate {
    fn failed(lang: Lang, message: impl Into<String>, notices: Vec<String>) -> Self {
        Self {
            title: lang.text("crop_recommendation").to_string(),
            lang,
            path: "/",
            error: Some(message.into()),
            notices,
            inputs: Vec::new(),
            rows: Vec::new(),
            soil_tips: Vec::new(),
            weather_notes: Vec::new(),
            top_crop: String::new(),
            fertilizer_plan: Vec::new(),
        }
    }
}

fn input_summary(sample: &SoilSample) -> Vec<(&'static str, String)> {
    vec![
        ("N", format!("{:.1}", sample.n)),
        ("P", format!("{:.1}", sample.p)),
        ("K", format!("{:.1}", sample.k)),
        ("pH", format!("{:.2}", sample.ph)),
        ("Temperature (°C)", format!("{:.1}", sample.temperature)),
        ("Humidity (%)", format!("{:.1}", sample.humidity)),
        ("Rainfall (mm)", format!("{:.1}", sample.rainfall)),
    ]
}

pub async fn recommend_page(State(state): State<AppState>, Form(form): Form<RecommendForm>) -> impl IntoResponse {
    let lang = Lang::from_code(form.lang.as_deref());
    let mut notices = Vec::new();

    let mut sample = match resolve_sample(&form, &state) {
        Ok(sample) => sample,
        Err(message) => return render(&RecommendTemplate::failed(lang, message, notices)),
    };

    if let Some(location) = non_blank(form.location.clone()) {
        match state.weather.get_weather_snapshot(&location, true).await {
            Ok(snapshot) => {
                snapshot.apply_to(&mut sample);
                notices.push(format!("Using current weather for {}.", snapshot.location));
            }
            Err(e) => notices.push(format!("Live weather unavailable ({}); using entered values.", e)),
        }
    }

    let Ok(predictor) = state.require_predictor() else {
        return render(&RecommendTemplate::failed(
            lang,
            "The recommendation model is not trained yet. Run `train_model` and restart the server.",
            notices,
        ));
    };

    let response: CropRecommendationResponse = match cached_recommendation(&state, predictor, sample.clone())
        .await
        .and_then(|value| {
            serde_json::from_value(value)
                .map_err(|e| crate::api_server::AppError::Internal(format!("JSON decode error: {}", e)))
        }) {
        Ok(response) => response,
        Err(e) => return render(&RecommendTemplate::failed(lang, e.message(), notices)),
    };

    let readings = SoilReadings::from(&sample);
    let percentages = display_percentages(&response.recommendations);
    let labels = suitability_labels(&response.recommendations);

    let mut rows = Vec::with_capacity(response.recommendations.len());
    for ((rec, percent), label) in response.recommendations.iter().zip(percentages).zip(labels) {
        let water = get_water_info(&rec.name, state.crop_guide.dataset_water_average(&rec.name));
        let price = state.market.get_market_price(&rec.name, None).await;
        let projection = predict_yield(&state.yield_estimator, &rec.name, &readings);

        rows.push(RecommendationRow {
            name: rec.name.clone(),
            percent,
            label,
            rationale: rec.rationale.clone(),
            water_mm: water.mm.clone(),
            water_cycles: irrigation_cycles(&water),
            water_stage: water.stage,
            price: rupees(price.price),
            price_source: price.source.clone(),
            trend: price.trend.clone(),
            yield_level: projection.level.clone(),
            yield_output: format!("{:.1} q/acre", projection.estimated_output),
            revenue: rupees(projection.estimated_revenue(price.price)),
        });
    }

    let top_crop = rows.first().map(|r| r.name.clone()).unwrap_or_default();
    let fertilizer_plan = if top_crop.is_empty() {
        Vec::new()
    } else {
        recommend_fertilizer(&top_crop, &readings)
    };

    render(&RecommendTemplate {
        title: lang.text("crop_recommendation").to_string(),
        lang,
        path: "/",
        error: None,
        notices,
        inputs: input_summary(&sample),
        rows,
        soil_tips: response.soil_tips,
        weather_notes: response.weather_notes,
        top_crop,
        fertilizer_plan,
    })
}

// ============================================================================
// Market Page
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct MarketQuery {
    pub crop: Option<String>,
    pub state: Option<String>,
    pub lang: Option<String>,
}

pub struct PriceRow {
    pub crop: String,
    pub price: String,
    pub range: String,
    pub trend: String,
    pub demand: String,
    pub source: String,
    pub updated: String,
}

#[derive(Template)]
#[template(path = "pages/market.html")]
pub struct MarketTemplate {
    pub title: String,
    pub lang: Lang,
    pub path: &'static str,
    pub query_crop: String,
    pub query_state: String,
    pub selected: Option<PriceRow>,
    pub rows: Vec<PriceRow>,
}

fn price_row(crop: &str, price: &crate::services::MarketPrice) -> PriceRow {
    let range = match (price.min_price, price.max_price) {
        (Some(min), Some(max)) => format!("{} – {}", rupees(min), rupees(max)),
        _ => "—".to_string(),
    };
    PriceRow {
        crop: crate::utils::title_case(crop),
        price: rupees(price.price),
        range,
        trend: price.trend.clone(),
        demand: price.demand.clone(),
        source: price.source.clone(),
        updated: price.last_updated.clone(),
    }
}

pub async fn market_page(State(state): State<AppState>, Query(query): Query<MarketQuery>) -> impl IntoResponse {
    let lang = Lang::from_code(query.lang.as_deref());
    let crop = non_blank(query.crop);
    let region = non_blank(query.state);

    let selected = match crop.as_deref() {
        Some(crop) => Some(price_row(
            crop,
            &state.market.get_market_price(crop, region.as_deref()).await,
        )),
        None => None,
    };

    let rows = state
        .market
        .get_all_crop_prices()
        .await
        .iter()
        .map(|(crop, price)| price_row(crop, price))
        .collect();

    render(&MarketTemplate {
        title: lang.text("market_outlook").to_string(),
        lang,
        path: "/market",
        query_crop: crop.unwrap_or_default(),
        query_state: region.unwrap_or_default(),
        selected,
        rows,
    })
}

// ============================================================================
// Pest & Disease Page
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PestQuery {
    pub disease: Option<String>,
    pub severity: Option<String>,
    pub lang: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/pest.html")]
pub struct PestTemplate {
    pub title: String,
    pub lang: Lang,
    pub path: &'static str,
    pub diseases: Vec<String>,
    pub severities: [&'static str; 3],
    pub selected_disease: String,
    pub selected_severity: String,
    pub plan: Option<PesticidePlan>,
}

pub async fn pest_page(Query(query): Query<PestQuery>) -> impl IntoResponse {
    let lang = Lang::from_code(query.lang.as_deref());
    let disease = non_blank(query.disease);
    let severity = non_blank(query.severity);

    let plan = disease
        .as_deref()
        .map(|d| recommend_pesticide(d, severity.as_deref()));

    render(&PestTemplate {
        title: lang.text("pest_disease").to_string(),
        lang,
        path: "/pest",
        diseases: supported_diseases(),
        severities: SEVERITY_LEVELS,
        selected_disease: disease.unwrap_or_default(),
        selected_severity: severity.unwrap_or_default(),
        plan,
    })
}

// ============================================================================
// Chat Page
// ============================================================================

pub struct ChatMessage {
    pub is_user: bool,
    pub html: String,
}

#[derive(Template)]
#[template(path = "pages/chat.html")]
pub struct ChatTemplate {
    pub title: String,
    pub lang: Lang,
    pub path: &'static str,
    pub messages: Vec<ChatMessage>,
    pub history_json: String,
}

impl ChatTemplate {
    fn from_history(lang: Lang, history: &[ChatTurn]) -> Self {
        let messages = history
            .iter()
            .map(|turn| {
                let is_user = turn.role == "user";
                ChatMessage {
                    is_user,
                    // User text is escaped by the template; replies are markdown
                    html: if is_user { turn.content.clone() } else { render_markdown(&turn.content) },
                }
            })
            .collect();
        Self {
            title: lang.text("crop_chatbot").to_string(),
            lang,
            path: "/chat",
            messages,
            history_json: serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatForm {
    pub query: String,
    #[serde(default)]
    pub history: String,
    pub lang: Option<String>,
}

pub async fn chat_page(Query(query): Query<LangQuery>) -> impl IntoResponse {
    render(&ChatTemplate::from_history(query.lang(), &[]))
}

pub async fn chat_submit(State(state): State<AppState>, Form(form): Form<ChatForm>) -> impl IntoResponse {
    let mut history: Vec<ChatTurn> = if form.history.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&form.history).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable chat history: {}", e);
            Vec::new()
        })
    };

    let query = form.query.trim().to_string();
    if !query.is_empty() {
        let ctx = state.chat.with_conversation(history.clone());
        let reply = generate_crop_response(&query, &ctx, &state.chat_providers).await;
        history.push(ChatTurn { role: "user".to_string(), content: query });
        history.push(ChatTurn { role: "assistant".to_string(), content: reply });
    }

    render(&ChatTemplate::from_history(Lang::from_code(form.lang.as_deref()), &history))
}

// ============================================================================
// About Page
// ============================================================================

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub title: String,
    pub lang: Lang,
    pub path: &'static str,
    pub model_ready: bool,
    pub crop_count: usize,
    pub accuracy: Option<String>,
    pub macro_f1: Option<String>,
    pub weather_configured: bool,
    pub gemini_configured: bool,
    pub openai_configured: bool,
}

fn load_metrics(state: &AppState) -> Option<TrainingMetrics> {
    let path = state.settings.paths().metrics();
    let text = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&text)
        .map_err(|e| tracing::warn!("Unreadable metrics at {}: {}", path.display(), e))
        .ok()
}

pub async fn about_page(State(state): State<AppState>, Query(query): Query<LangQuery>) -> impl IntoResponse {
    let lang = query.lang();
    let metrics = load_metrics(&state);
    render(&AboutTemplate {
        title: lang.text("about").to_string(),
        lang,
        path: "/about",
        model_ready: state.model_ready(),
        crop_count: state.crop_guide.len(),
        accuracy: metrics.as_ref().map(|m| format!("{:.1}%", m.accuracy * 100.0)),
        macro_f1: metrics.as_ref().map(|m| format!("{:.3}", m.macro_f1)),
        weather_configured: state.weather.is_configured(),
        gemini_configured: state.chat_providers.gemini_configured(),
        openai_configured: state.chat_providers.openai_configured(),
    })
}
