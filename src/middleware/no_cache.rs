use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::{stream, StreamExt};

use crate::error::ApiError;

/// How much of an untyped body is inspected for an HTML prologue
const SNIFF_LEN: usize = 100;

/// Marks HTML responses as uncacheable so a page rendered for one company is
/// never replayed after the session selects another.
pub async fn no_cache_middleware(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("text/html"));

    if is_html {
        return mark_no_cache(response);
    }

    // Untyped bodies that look like an HTML document get the same treatment
    if response.headers().get(header::CONTENT_TYPE).is_none() {
        return sniff_untyped(response).await;
    }

    response
}

/// Peeks at the first chunks of an untyped body and replays them ahead of the
/// rest of the stream, which is left unbuffered.
async fn sniff_untyped(response: Response) -> Response {
    let (parts, body) = response.into_parts();
    let mut rest = body.into_data_stream();

    let mut head: Vec<Bytes> = Vec::new();
    let mut seen = 0;
    while seen < SNIFF_LEN {
        match rest.next().await {
            Some(Ok(chunk)) => {
                seen += chunk.len();
                head.push(chunk);
            }
            Some(Err(e)) => {
                tracing::error!("Failed to read response body: {}", e);
                return ApiError::internal_server_error("Failed to produce response").into_response();
            }
            None => break,
        }
    }

    let prefix: Vec<u8> = head.iter().flat_map(|c| c.iter().copied()).take(SNIFF_LEN).collect();
    let looks_html = prefix
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(false, |start| prefix[start..].starts_with(b"<!"));

    let replay = stream::iter(head.into_iter().map(Ok::<_, axum::Error>)).chain(rest);
    let response = Response::from_parts(parts, Body::from_stream(replay));
    if looks_html {
        mark_no_cache(response)
    } else {
        response
    }
}

fn mark_no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.remove(header::ETAG);
    headers.remove(header::LAST_MODIFIED);
    response
}
