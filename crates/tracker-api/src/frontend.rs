//! Frontend hosting: runtime config, API docs shell, and the SPA file
//! server.
//!
//! `/config.js` emits a window-scoped constant the frontend reads at boot.
//! Unknown paths fall through to the SPA's `index.html`; filesystem errors
//! other than not-exist return 500.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};

use crate::server::AppState;

/// Handler for `/config.js`: a JS literal carrying the frontend settings.
pub async fn config_js(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let frontend = &state.config.frontend;
    let payload = serde_json::json!({
        "jira": {
            "domain": frontend.jira_domain,
            "projectKey": frontend.jira_project_key,
        },
        "slack": {
            "workspace": frontend.slack_workspace,
            "eventsChannel": frontend.slack_events_channel,
        },
    });
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        format!("window.TRACKER_CONFIG = {payload};\n"),
    )
}

/// Handler for `/docs`: a Swagger UI shell pointed at `/swagger.json`.
pub async fn docs() -> Html<&'static str> {
    Html(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>tracker API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      SwaggerUIBundle({ url: "/swagger.json", dom_id: "#swagger-ui" });
    };
  </script>
</body>
</html>
"##,
    )
}

/// Fallback handler serving the SPA build.
///
/// Existing files are served as-is; missing paths get `index.html` so
/// client-side routing works; other filesystem errors are surfaced as 500.
pub async fn spa_fallback(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let frontend_dir = PathBuf::from(&state.config.frontend_dir);
    let requested = uri.path().trim_start_matches('/');

    if requested.split('/').any(|segment| segment == "..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = if requested.is_empty() {
        frontend_dir.join("index.html")
    } else {
        frontend_dir.join(requested)
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => file_response(&path, bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let index = frontend_dir.join("index.html");
            match tokio::fs::read(&index).await {
                Ok(bytes) => file_response(&index, bytes),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    (StatusCode::NOT_FOUND, "frontend not available").into_response()
                }
                Err(err) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
                }
            }
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

fn file_response(path: &Path, bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, content_type_for(path))], bytes).into_response()
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}
