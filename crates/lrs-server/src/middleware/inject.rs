//! HTML injection middleware: inserts the live reload agent before `</body>`.

use std::borrow::Cow;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;

use crate::live_reload::CLIENT_SCRIPT_PATH;

/// Script tag referencing the agent. Its presence marks a body as injected.
pub const SCRIPT_TAG: &str = r#"<script src="/__livereload/client.js"></script>"#;

const BODY_CLOSE: &[u8] = b"</body";

/// Insert [`SCRIPT_TAG`] into an HTML document.
///
/// The tag goes immediately before the last `</body` (case-insensitive), or at
/// the end when there is none. A body that already references the agent is
/// returned unchanged.
#[must_use]
pub fn inject_script(body: &[u8]) -> Cow<'_, [u8]> {
    if find(body, CLIENT_SCRIPT_PATH.as_bytes()).is_some() {
        return Cow::Borrowed(body);
    }

    let at = rfind_ignore_ascii_case(body, BODY_CLOSE).unwrap_or(body.len());

    let mut out = Vec::with_capacity(body.len() + SCRIPT_TAG.len());
    out.extend_from_slice(&body[..at]);
    out.extend_from_slice(SCRIPT_TAG.as_bytes());
    out.extend_from_slice(&body[at..]);
    Cow::Owned(out)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|w| w.eq_ignore_ascii_case(needle))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"))
}

/// Axum middleware: inject the agent into successful HTML responses.
pub(crate) async fn inject_livereload(req: Request, next: Next) -> Response {
    let is_head = req.method() == Method::HEAD;
    let response = next.run(req).await;

    if is_head || response.status() != StatusCode::OK || !is_html(&response) {
        return response;
    }
    if response.headers().contains_key(header::CONTENT_ENCODING) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to buffer HTML response for live reload");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let injected = match inject_script(&bytes) {
        Cow::Borrowed(_) => None,
        Cow::Owned(injected) => Some(injected),
    };
    let body = injected.map_or_else(|| Body::from(bytes), Body::from);
    Response::from_parts(parts, body)
}
