//! The site's entry page.

use axum::extract::Request;
use axum::response::{Html, IntoResponse, Response};

use crate::error::{ApiError, ApiResult};
use crate::router::RouteGroup;
use crate::routes::hot_reload::RELOAD_CLIENT_SCRIPT;
use crate::state::AppState;

/// Build the page routes.
pub fn routes(state: &AppState) -> RouteGroup {
    RouteGroup::new("")
        .get("/", state.bind(index))
        .get("/index.html", state.bind(index))
}

/// GET / - `index.html` from the content directory.
///
/// A missing file is answered with 404 here rather than falling through
/// to static serving.
async fn index(state: AppState, _req: Request) -> ApiResult<Response> {
    let path = state.config().content_dir.join("index.html");
    let page = tokio::fs::read_to_string(&path).await.map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Index page unavailable");
        ApiError::NotFound("Page not found".to_string())
    })?;

    let page = if state.config().dev_mode {
        inject_reload_client(&page)
    } else {
        page
    };
    Ok(Html(page).into_response())
}

/// Insert the reload client before the last `</body>`, or append it when
/// the page has none.
fn inject_reload_client(page: &str) -> String {
    match page.rfind("</body>") {
        Some(at) => format!("{}{}{}", &page[..at], RELOAD_CLIENT_SCRIPT, &page[at..]),
        None => format!("{}{}", page, RELOAD_CLIENT_SCRIPT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_lands_before_closing_body() {
        let page = inject_reload_client("<html><body><p>hi</p></body></html>");
        let script = page.find("<script>").unwrap();
        let body_end = page.find("</body>").unwrap();
        assert!(page.starts_with("<html><body><p>hi</p>"));
        assert!(script < body_end);
        assert!(page.ends_with("</body></html>"));
    }

    #[test]
    fn test_script_appended_without_body_tag() {
        let page = inject_reload_client("<p>fragment</p>");
        assert!(page.starts_with("<p>fragment</p><script>"));
    }
}
