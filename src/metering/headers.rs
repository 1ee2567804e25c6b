//! Range and length header correction for truncated responses.
//!
//! Runs before the body is touched: the corrected headers and status are
//! what the client sees, so they have to be settled before streaming starts.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

/// Rewrite `Content-Range`/`Content-Length` to describe at most `cap` bytes
/// and return the status the client should see.
///
/// Only call this for a 2xx upstream response.
pub fn correct_headers(headers: &mut HeaderMap, cap: u64) -> StatusCode {
    let ranged = headers.contains_key(header::CONTENT_RANGE);

    if let Some(rewritten) = headers
        .get(header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| truncate_content_range(v, cap))
    {
        if let Ok(value) = HeaderValue::from_str(&rewritten) {
            headers.insert(header::CONTENT_RANGE, value);
        }
    }

    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if matches!(content_length, Some(len) if len > cap) {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(cap));
    }

    if ranged {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    }
}

/// Shorten a `bytes <start>-<end>/<total>` range so that `end - start` does
/// not exceed `cap`. Returns `None` when no rewrite applies (unsatisfied or
/// unparseable range, or a range already within the cap).
pub fn truncate_content_range(value: &str, cap: u64) -> Option<String> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    if total != "*" && total.parse::<u64>().is_err() {
        return None;
    }

    let (start, end) = range.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = end.parse().ok()?;
    if end < start || end - start <= cap {
        return None;
    }

    Some(format!("bytes {}-{}/{}", start, start + cap, total))
}
