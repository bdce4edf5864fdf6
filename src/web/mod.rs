// Dashboard pages (Askama templates, plain form round-trips)

pub mod handlers;
pub mod i18n;
pub mod markdown;

pub use i18n::{get_text, Lang};
pub use markdown::render_markdown;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::api_server::AppState;
use handlers::pages;

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home_page))
        .route("/recommend", post(pages::recommend_page))
        .route("/pest", get(pages::pest_page))
        .route("/market", get(pages::market_page))
        .route("/chat", get(pages::chat_page).post(pages::chat_submit))
        .route("/about", get(pages::about_page))
        .nest_service("/static", ServeDir::new("static"))
}
