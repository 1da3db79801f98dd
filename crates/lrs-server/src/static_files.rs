//! Static file serving.
//!
//! Files come from [`ServeDir`] over the web root. Two middlewares sit in
//! front of it: default documents for directory requests and, when enabled,
//! rendering of renderer pages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::uri::PathAndQuery;
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use lrs_config::Configuration;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Characters escaped when a default file name is appended to a URL path.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// File service over the web root.
pub(crate) fn serve_dir(config: &Configuration) -> ServeDir {
    ServeDir::new(&config.web_root).append_index_html_on_directories(false)
}

/// Map a URL path to a path relative to the web root.
///
/// Returns `None` for paths that would escape the web root or do not decode.
pub(crate) fn relative_fs_path(url_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    let mut relative = PathBuf::new();

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains(['\\', '\0']) => return None,
            s => relative.push(s),
        }
    }

    Some(relative)
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Resolve directory requests to a default document.
///
/// A directory without a trailing slash is redirected to the slash form so
/// relative links in the page resolve. With the slash, the request is
/// rewritten to the first existing default file name.
pub(crate) async fn default_documents(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if !is_read(req.method()) {
        return next.run(req).await;
    }
    let path = req.uri().path().to_owned();
    let Some(relative) = relative_fs_path(&path) else {
        return next.run(req).await;
    };
    let dir = state.config.web_root.join(relative);
    if !dir.is_dir() {
        return next.run(req).await;
    }

    let query = req.uri().query().map(|q| format!("?{q}")).unwrap_or_default();

    if !path.ends_with('/') {
        return Redirect::temporary(&format!("{path}/{query}")).into_response();
    }

    let default_file = state
        .config
        .default_file_names
        .iter()
        .find(|name| dir.join(name).is_file());

    if let Some(name) = default_file {
        let rewritten = format!("{path}{}{query}", utf8_percent_encode(name, SEGMENT));
        match rewrite_path(req.uri(), &rewritten) {
            Ok(uri) => *req.uri_mut() = uri,
            Err(err) => tracing::warn!(path = %rewritten, error = %err, "Cannot rewrite default document"),
        }
    }

    next.run(req).await
}

fn rewrite_path(uri: &Uri, path_and_query: &str) -> Result<Uri, axum::http::Error> {
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

fn has_page_extension(path: &Path, extension: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .is_some_and(|name| name.ends_with(&extension.to_lowercase()))
}

/// Route renderer pages through the renderer.
///
/// Other requests, and pages that do not exist, fall through to the file
/// service.
pub(crate) async fn render_pages(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(renderer) = state.renderer.clone() else {
        return next.run(req).await;
    };
    if !is_read(req.method()) {
        return next.run(req).await;
    }
    let Some(relative) = relative_fs_path(req.uri().path()) else {
        return next.run(req).await;
    };
    if !has_page_extension(&relative, renderer.extension()) {
        return next.run(req).await;
    }
    let page = state.config.web_root.join(relative);
    if !page.is_file() {
        return next.run(req).await;
    }

    let rendered = {
        let page = page.clone();
        tokio::task::spawn_blocking(move || renderer.render(&page)).await
    };

    match rendered {
        Ok(Ok(html)) => Html(html).into_response(),
        Ok(Err(err)) => {
            tracing::error!(page = %page.display(), error = %err, "Failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
        Err(err) => {
            tracing::error!(page = %page.display(), error = %err, "Render task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}
