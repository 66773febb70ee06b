use axum::response::Html;

const INDEX_PAGE: &str = include_str!("../../static/index.html");

/// The browser client. Served as-is; the page talks only to `/api/*`.
///
/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}
