// API Integration Tests
//
// Purpose: Drive every JSON endpoint and dashboard page through the router
// against a small synthetic dataset in a temp directory
// Run with: cargo test --test api_integration_tests

#[cfg(feature = "api")]
mod api_tests {
    use agro_advisor::model::training::{save_model, train_from_path};
    use agro_advisor::model::TrainingConfig;
    use agro_advisor::services::MarketPriceService;
    use agro_advisor::{create_router, AppState, Settings};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::fmt::Write as _;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt; // for oneshot

    /// Nothing listens here, so price lookups fall back immediately
    const DEAD_MARKET_URL: &str = "http://127.0.0.1:9";

    // Helper: training CSV with three well separated crops
    fn write_training_csv(settings: &Settings) {
        let path = settings.paths().training_dataset();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut csv = String::from("N,P,K,temperature,humidity,ph,rainfall,label\n");
        for i in 0..20 {
            let j = i as f64 * 0.5;
            writeln!(csv, "{},42,43,21,82,6.5,{},rice", 90.0 + j, 200.0 + j).unwrap();
            writeln!(csv, "{},67,20,18,17,6.0,80,chickpea", 20.0 + j).unwrap();
            writeln!(csv, "{},46,20,24,80,6.8,68,cotton", 118.0 + j).unwrap();
        }
        std::fs::write(path, csv).unwrap();
    }

    // Helper: Create test app state, optionally with a trained model on disk
    async fn create_test_app(with_model: bool) -> (axum::Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let settings = Settings::for_data_dir(dir.path());

        if with_model {
            write_training_csv(&settings);
            let config = TrainingConfig { n_estimators: 20, ..TrainingConfig::default() };
            let artifacts = train_from_path(&config, &settings.paths().training_dataset()).unwrap();
            save_model(&artifacts.pipeline, &settings.paths().artifacts_models).unwrap();
        }

        let mut state = AppState::new(settings).await.unwrap();
        state.market = MarketPriceService::with_base_url("test-key", Duration::from_secs(60), DEAD_MARKET_URL);
        (create_router(state), dir)
    }

    // Helper: Parse JSON response
    async fn json_response(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        serde_json::from_slice(&body).expect("Failed to parse JSON")
    }

    async fn text_response(response: axum::response::Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        String::from_utf8(body.to_vec()).expect("Body is not UTF-8")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn urlencode(value: &str) -> String {
        value
            .bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
                _ => format!("%{:02X}", b),
            })
            .collect()
    }

    fn rice_sample() -> Value {
        json!({
            "N": 91.0, "P": 42.0, "K": 43.0,
            "temperature": 21.0, "humidity": 82.0, "ph": 6.5, "rainfall": 202.0
        })
    }

    // =========================================================================
    // Section 1: Health Check
    // =========================================================================

    #[tokio::test]
    async fn test_health_check_reports_model_state() {
        let (app, _dir) = create_test_app(false).await;
        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_ready"], false);
        assert!(body["timestamp"].is_string());
    }

    // =========================================================================
    // Section 2: Crop Recommendation
    // =========================================================================

    #[tokio::test]
    async fn test_recommend_without_model_is_unavailable() {
        let (app, _dir) = create_test_app(false).await;
        let response = app.oneshot(post_json("/api/recommend", rice_sample())).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_response(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_recommend_ranks_matching_crop_first() {
        let (app, _dir) = create_test_app(true).await;
        let response = app.oneshot(post_json("/api/recommend", rice_sample())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        let recommendations = body["recommendations"].as_array().unwrap();
        assert_eq!(recommendations.len(), 3);
        assert_eq!(recommendations[0]["name"], "Rice");
        assert!(recommendations[0]["rationale"].as_str().unwrap().contains("Rice"));

        let total: f64 = recommendations.iter().map(|r| r["score"].as_f64().unwrap()).sum();
        assert!(total <= 1.0 + 1e-9);
        assert!(body["soil_tips"].is_array());
        assert!(body["weather_notes"].is_array());
    }

    #[tokio::test]
    async fn test_recommend_repeated_request_is_stable() {
        let (app, _dir) = create_test_app(true).await;
        let first = app.clone().oneshot(post_json("/api/recommend", rice_sample())).await.unwrap();
        let second = app.oneshot(post_json("/api/recommend", rice_sample())).await.unwrap();

        assert_eq!(json_response(first).await, json_response(second).await);
    }

    #[tokio::test]
    async fn test_recommend_rejects_out_of_range_fields() {
        let (app, _dir) = create_test_app(true).await;
        let cases = [
            ("N", -1.0),
            ("N", 250.0),
            ("P", 201.0),
            ("K", -5.0),
            ("temperature", 55.0),
            ("humidity", 120.0),
            ("ph", 3.0),
            ("ph", 10.0),
            ("rainfall", 500.0),
        ];

        for (field, value) in cases {
            let mut sample = rice_sample();
            sample[field] = json!(value);
            let response = app.clone().oneshot(post_json("/api/recommend", sample)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} = {}", field, value);
            let body = json_response(response).await;
            assert!(body["error"].as_str().unwrap().contains("must be between"), "{} = {}", field, value);
        }
    }

    #[tokio::test]
    async fn test_recommend_validates_before_model_check() {
        let (app, _dir) = create_test_app(false).await;
        let mut sample = rice_sample();
        sample["humidity"] = json!(101.0);
        let response = app.oneshot(post_json("/api/recommend", sample)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_recommend_rejects_non_finite_numbers() {
        let (app, _dir) = create_test_app(true).await;
        // JSON has no NaN or infinity; an overflowing literal is the closest a client can send
        let body = r#"{"N": 1e400, "P": 42, "K": 43, "temperature": 21, "humidity": 82, "ph": 6.5, "rainfall": 202}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/api/recommend")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_recommend_rejects_incomplete_payload() {
        let (app, _dir) = create_test_app(true).await;
        let response = app
            .oneshot(post_json("/api/recommend", json!({ "N": 90.0, "P": 40.0 })))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_region_npk_lookup() {
        let (app, _dir) = create_test_app(false).await;
        let response = app.clone().oneshot(get("/api/regions/Punjab/npk")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        assert_eq!(body["region"], "punjab");
        assert_eq!(body["npk"]["N"], 95.0);

        let missing = app.oneshot(get("/api/regions/Atlantis/npk")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_region_recommendations() {
        let (untrained, _dir) = create_test_app(false).await;
        let response = untrained.oneshot(get("/api/regions/Punjab/recommendations")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let (app, _dir) = create_test_app(true).await;
        let response = app.clone().oneshot(get("/api/regions/Punjab/recommendations")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        assert_eq!(body["region"], "Punjab");
        assert_eq!(body["source"], "regional");
        let recommendations = body["recommendations"].as_array().unwrap();
        assert_eq!(recommendations.len(), 3);
        assert_eq!(recommendations[0]["suitability"], "Regional match");

        let body = json_response(app.oneshot(get("/api/regions/Atlantis/recommendations")).await.unwrap()).await;
        assert_eq!(body["source"], "synthetic");
        assert!(body["recommendations"][0]["rationale"].as_str().unwrap().contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_soil_profiles_fall_back_without_dataset() {
        let (app, _dir) = create_test_app(false).await;
        let response = app.clone().oneshot(get("/api/soil-profiles")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        let options = body["options"].as_array().unwrap();
        assert_eq!(options.len(), 5);
        assert_eq!(options[0]["label"], "Alluvial soil");

        let missing = app.oneshot(get("/api/soil-profiles/alluvial_soil")).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    // =========================================================================
    // Section 3: Advisories
    // =========================================================================

    #[tokio::test]
    async fn test_fertilizer_plan_for_deficient_soil() {
        let (app, _dir) = create_test_app(false).await;
        let response = app
            .clone()
            .oneshot(post_json("/api/fertilizer", json!({ "crop": "rice", "N": 10.0, "P": 5.0, "K": 8.0, "ph": 6.5 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        assert_eq!(body["crop"], "rice");
        let plan = body["plan"].as_array().unwrap();
        assert!(!plan.is_empty());
        assert!(plan.iter().all(|item| item["product"].is_string()));

        let blank = app.oneshot(post_json("/api/fertilizer", json!({ "crop": " " }))).await.unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pesticide_plan_and_disease_list() {
        let (app, _dir) = create_test_app(false).await;
        let diseases = app.clone().oneshot(get("/api/pesticide/diseases")).await.unwrap();
        assert_eq!(diseases.status(), StatusCode::OK);
        let listed = json_response(diseases).await;
        let first = listed["diseases"][0].as_str().unwrap().to_string();

        let response = app
            .oneshot(post_json("/api/pesticide", json!({ "disease": first.to_lowercase(), "severity": "high" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        assert_eq!(body["disease"], first);
        assert!(body["chemical"].is_string());
    }

    #[tokio::test]
    async fn test_diagnose_rejects_bad_images() {
        let (app, _dir) = create_test_app(false).await;
        let empty = app
            .clone()
            .oneshot(Request::builder().method("POST").uri("/api/disease/diagnose?crop=tomato").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let garbage = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/disease/diagnose?crop=tomato")
                    .body(Body::from(vec![1u8, 2, 3, 4]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_yield_projection_uses_fallback_price() {
        let (app, _dir) = create_test_app(false).await;
        let response = app
            .oneshot(post_json(
                "/api/yield",
                json!({ "crop": "rice", "N": 90.0, "P": 40.0, "K": 40.0, "ph": 6.5, "rainfall": 200.0 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        assert_eq!(body["projection"]["crop"], "Rice");
        assert_eq!(body["market_price"]["is_live"], false);

        let output = body["projection"]["estimated_output"].as_f64().unwrap();
        let price = body["market_price"]["price"].as_f64().unwrap();
        let revenue = body["estimated_revenue"].as_f64().unwrap();
        assert!((revenue - output * price).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unknown_crop_details_not_found() {
        let (app, _dir) = create_test_app(false).await;
        let response = app.oneshot(get("/api/crops/dragonfruit")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_water_info_from_fallback_table() {
        let (app, _dir) = create_test_app(false).await;
        let response = app.oneshot(get("/api/water/rice")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        assert_eq!(body["source"], "fallback");
        assert!(body["mm"].is_string());
    }

    // =========================================================================
    // Section 4: External Services
    // =========================================================================

    #[tokio::test]
    async fn test_weather_without_key_is_unavailable() {
        let (app, _dir) = create_test_app(false).await;
        let response = app.oneshot(get("/api/weather/Delhi")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_response(response).await;
        assert_eq!(body["error"], "OPENWEATHER_API_KEY is not configured");
    }

    #[tokio::test]
    async fn test_market_price_falls_back() {
        let (app, _dir) = create_test_app(false).await;
        let response = app.clone().oneshot(get("/api/market/rice?state=Punjab")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_response(response).await;
        assert_eq!(body["crop"], "rice");
        assert_eq!(body["price"]["is_live"], false);
        assert!(body["price"]["price"].as_f64().unwrap() > 0.0);

        let all = app.oneshot(get("/api/market")).await.unwrap();
        let body = json_response(all).await;
        assert!(body["rows"].as_u64().unwrap() > 0);
    }

    // =========================================================================
    // Section 5: Chat
    // =========================================================================

    #[tokio::test]
    async fn test_chat_routes_without_providers() {
        let (app, _dir) = create_test_app(false).await;

        let refusal = app
            .clone()
            .oneshot(post_json("/api/chat", json!({ "query": "Who won the cricket match?" })))
            .await
            .unwrap();
        let body = json_response(refusal).await;
        assert_eq!(
            body["reply"],
            "I am your Agricultural Advisory Assistant. Please ask crop or farming related questions."
        );

        let advisory = app
            .oneshot(post_json(
                "/api/chat",
                json!({ "query": "best crop for kharif season", "history": [{ "role": "user", "content": "hello" }] }),
            ))
            .await
            .unwrap();
        assert_eq!(advisory.status(), StatusCode::OK);
        let body = json_response(advisory).await;
        assert!(body["reply"].as_str().unwrap().starts_with("AI service unavailable ("));
        assert!(body["html"].as_str().unwrap().contains("<p>"));
    }

    // =========================================================================
    // Section 6: Dashboard Pages
    // =========================================================================

    #[tokio::test]
    async fn test_home_and_about_pages_render() {
        let (app, _dir) = create_test_app(false).await;

        let home = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(home.status(), StatusCode::OK);
        let html = text_response(home).await;
        assert!(html.contains("Crop Recommendation"));
        assert!(html.contains("Pest &amp; Disease Management"));
        assert!(html.contains("Alluvial soil"));

        let about = text_response(app.oneshot(get("/about")).await.unwrap()).await;
        assert!(about.contains("not trained"));
    }

    #[tokio::test]
    async fn test_recommend_page_with_and_without_model() {
        let (untrained, _dir) = create_test_app(false).await;
        let html = text_response(
            untrained
                .oneshot(post_form("/recommend", "n=91&p=42&k=43&ph=6.5&temperature=&humidity=&rainfall="))
                .await
                .unwrap(),
        )
        .await;
        assert!(html.contains("not trained yet"));

        let (trained, _dir) = create_test_app(true).await;
        let html = text_response(
            trained
                .oneshot(post_form("/recommend", "n=91&p=42&k=43&ph=6.5&temperature=21&humidity=82&rainfall=202"))
                .await
                .unwrap(),
        )
        .await;
        assert!(html.contains("<h2>Rice</h2>"));
        assert!(html.contains("Nutrient plan tailored for Rice"));
        // A missing irrigation count never renders as a dash
        assert!(!html.contains(", - irrigations"));
    }

    #[tokio::test]
    async fn test_recommend_page_requires_nutrients() {
        let (app, _dir) = create_test_app(true).await;
        let html = text_response(app.oneshot(post_form("/recommend", "n=&p=&k=&ph=")).await.unwrap()).await;
        assert!(html.contains("Enter N, P, K and pH"));
    }

    #[tokio::test]
    async fn test_recommend_page_rejects_out_of_range_values() {
        let (app, _dir) = create_test_app(true).await;
        let html = text_response(
            app.clone()
                .oneshot(post_form("/recommend", "n=91&p=42&k=43&ph=12&temperature=21&humidity=82&rainfall=202"))
                .await
                .unwrap(),
        )
        .await;
        assert!(html.contains("ph must be between 3.5 and 9.5"));
        assert!(!html.contains("<h2>Rice</h2>"));

        let html = text_response(
            app.oneshot(post_form("/recommend", "n=NaN&p=42&k=43&ph=6.5&temperature=21&humidity=82&rainfall=202"))
                .await
                .unwrap(),
        )
        .await;
        assert!(html.contains("must be a finite number"));
    }

    #[tokio::test]
    async fn test_pest_page_shows_protection_plan() {
        let (app, _dir) = create_test_app(false).await;

        let empty = text_response(app.clone().oneshot(get("/pest")).await.unwrap()).await;
        assert!(empty.contains("Select a disease to get protection recommendations"));
        assert!(empty.contains("Rice Blast"));

        let response = app.oneshot(get("/pest?disease=Rice+Blast&severity=High")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = text_response(response).await;
        assert!(html.contains("<h2>Rice Blast</h2>"));
        assert!(html.contains("Tricyclazole 75% WP"));
        assert!(html.contains("High severity detected"));
        assert!(html.contains("Chemical"));
        assert!(html.contains("Safety Guidance"));
        assert!(html.contains("Organic Alternative"));
    }

    #[tokio::test]
    async fn test_pages_switch_to_hindi() {
        let (app, _dir) = create_test_app(false).await;

        let html = text_response(app.clone().oneshot(get("/?lang=hi")).await.unwrap()).await;
        assert!(html.contains(r#"<html lang="hi">"#));
        assert!(html.contains("फसल सिफारिश"));
        // Toggle points back to English on the same page
        assert!(html.contains(r#"href="/?lang=en""#));

        let pest = text_response(app.oneshot(get("/pest?lang=hi")).await.unwrap()).await;
        assert!(pest.contains("कीट और रोग प्रबंधन"));
    }

    #[tokio::test]
    async fn test_chat_page_neutralises_unsafe_links() {
        let (app, _dir) = create_test_app(false).await;
        let history = json!([
            { "role": "user", "content": "where can I read more?" },
            { "role": "assistant", "content": "[read this](javascript:alert(1)) or [prices](https://agmarknet.gov.in)" }
        ])
        .to_string();
        let body = format!("query=&history={}", urlencode(&history));
        let html = text_response(app.oneshot(post_form("/chat", &body)).await.unwrap()).await;

        assert!(!html.contains(r#"href="javascript"#));
        assert!(html.contains(r##"href="#""##));
        assert!(html.contains(r#"href="https://agmarknet.gov.in""#));
    }

    #[tokio::test]
    async fn test_chat_page_round_trip_keeps_history() {
        let (app, _dir) = create_test_app(false).await;
        let html = text_response(
            app.oneshot(post_form("/chat", "query=Who+won+the+election%3F&history="))
                .await
                .unwrap(),
        )
        .await;

        assert!(html.contains("Who won the election?"));
        assert!(html.contains("Agricultural Advisory Assistant"));
        // History is carried forward in the hidden field
        assert!(html.contains("name=\"history\""));
        assert!(html.contains("assistant"));
    }
}
