//! Turns a validated media request into bytes on the wire.
//!
//! Local files are streamed straight from disk; the file handle lives inside
//! the response body and is closed when the body is dropped, including when
//! the client disconnects mid-stream. Externally hosted videos are never
//! proxied: the client gets a locked-down wrapper page instead.

use std::io::SeekFrom;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::media::headers::protect;
use crate::media::mime::{content_disposition, document_mime, video_mime};
use crate::media::range::parse_range;
use crate::models::content_item::StoredFile;
use crate::storage::LocalStorage;

#[derive(Clone)]
pub struct MediaResponder {
    storage: LocalStorage,
    embed_origins: Arc<[String]>,
}

impl MediaResponder {
    pub fn new(storage: LocalStorage, embed_origins: Vec<String>) -> Self {
        MediaResponder {
            storage,
            embed_origins: embed_origins.into(),
        }
    }

    pub fn embed_origins(&self) -> &[String] {
        &self.embed_origins
    }

    async fn open(&self, file: &StoredFile) -> Result<(File, u64), ApiError> {
        let path = self.storage.path(&file.stored_name)?;
        let handle = match File::open(&path).await {
            Ok(handle) => handle,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    stored_name = %file.stored_name,
                    original_name = %file.original_name,
                    "storage drift: media record points at a missing file"
                );
                return Err(ApiError::NotFound("Media file not found".to_string()));
            }
            Err(e) => {
                return Err(ApiError::Internal(format!(
                    "Failed to open {}: {}",
                    file.stored_name, e
                )))
            }
        };
        let size = handle
            .metadata()
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to stat media file: {}", e)))?
            .len();
        Ok((handle, size))
    }

    /// Serve an uploaded video, honouring a `Range` header.
    pub async fn video(
        &self,
        file: &StoredFile,
        range: Option<&HeaderValue>,
    ) -> Result<Response, ApiError> {
        let (mut handle, size) = self.open(file).await?;

        // Unreadable header values are treated like an absent header.
        let range = match range.and_then(|v| v.to_str().ok()) {
            Some(raw) => parse_range(raw, size)?,
            None => None,
        };

        let (status, start, len) = match range {
            Some(r) => (StatusCode::PARTIAL_CONTENT, r.start, r.len()),
            None => (StatusCode::OK, 0, size),
        };

        if start > 0 {
            handle
                .seek(SeekFrom::Start(start))
                .await
                .map_err(|e| ApiError::Internal(format!("Failed to seek media file: {}", e)))?;
        }

        let body = Body::from_stream(ReaderStream::new(handle.take(len)));
        let mut res = (status, body).into_response();
        let headers = res.headers_mut();
        protect(headers);
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        headers.insert(
            header::CONTENT_TYPE,
            header_value(&video_mime(Some(&file.mime_type), &file.original_name)),
        );
        if let Some(r) = range {
            headers.insert(header::CONTENT_RANGE, header_value(&r.content_range(size)));
        }

        tracing::debug!(
            stored_name = %file.stored_name,
            status = status.as_u16(),
            start,
            len,
            "streaming video"
        );

        Ok(res)
    }

    /// Serve an uploaded document. Spreadsheets are forced to download.
    pub async fn document(&self, file: &StoredFile) -> Result<Response, ApiError> {
        let (handle, size) = self.open(file).await?;
        let mime = document_mime(Some(&file.mime_type), &file.original_name);

        let body = Body::from_stream(ReaderStream::new(handle));
        let mut res = (StatusCode::OK, body).into_response();
        let headers = res.headers_mut();
        protect(headers);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        headers.insert(header::CONTENT_TYPE, header_value(&mime));
        headers.insert(
            header::CONTENT_DISPOSITION,
            header_value(&content_disposition(&mime, &file.original_name)),
        );

        Ok(res)
    }

    /// Wrapper page for an externally hosted video.
    ///
    /// The identifiers are exposed to client-side analytics only; they grant
    /// nothing.
    pub fn embed_page(
        &self,
        source_url: &str,
        content_id: i32,
        user_id: i32,
    ) -> Result<Response, ApiError> {
        let src = embed_source(source_url, &self.embed_origins).ok_or_else(|| {
            tracing::warn!(content_id, "external video host is not in the embed allow list");
            ApiError::Forbidden("External video host is not allowed".to_string())
        })?;

        let origins = self.embed_origins.join(" ");
        let csp = format!(
            "default-src 'none'; frame-src {origins}; script-src {origins}; \
             style-src 'unsafe-inline'; img-src 'self' data:; base-uri 'none'; \
             form-action 'none'; frame-ancestors 'self'"
        );

        let html = format!(
            "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"referrer\" content=\"strict-origin\">\n<title>Lesson video</title>\n\
             <style>html,body{{margin:0;height:100%;background:#000}}\
             iframe{{border:0;width:100%;height:100%}}</style>\n</head>\n<body>\n\
             <iframe src=\"{src}\" sandbox=\"allow-scripts allow-same-origin allow-presentation\" \
             allow=\"autoplay; encrypted-media; fullscreen; picture-in-picture\" allowfullscreen \
             referrerpolicy=\"strict-origin\" data-content-id=\"{content_id}\" \
             data-user-id=\"{user_id}\"></iframe>\n</body>\n</html>\n",
            src = escape_html(&src),
        );

        let mut res = (StatusCode::OK, html).into_response();
        let headers = res.headers_mut();
        protect(headers);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        headers.insert(header::CONTENT_SECURITY_POLICY, header_value(&csp));
        headers.insert(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin"),
        );

        Ok(res)
    }
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Player URL for an external video, or `None` when its host is not allowed.
///
/// Watch-page links for the common platforms are rewritten to their embed
/// players; any other URL must already live on an allowed origin.
pub fn embed_source(url: &str, allowed: &[String]) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.strip_prefix("m.").unwrap_or(host);
    let mut segments = parsed.path_segments().into_iter().flatten();

    let candidate = match host {
        "youtube.com" => {
            let id = match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed") | Some("shorts") | Some("live") => {
                    segments.next().map(str::to_string)
                }
                _ => None,
            }?;
            valid_video_id(&id).then(|| format!("https://www.youtube-nocookie.com/embed/{}", id))?
        }
        "youtu.be" => {
            let id = segments.next()?;
            valid_video_id(id).then(|| format!("https://www.youtube-nocookie.com/embed/{}", id))?
        }
        "vimeo.com" => {
            let id = segments.next()?;
            (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
                .then(|| format!("https://player.vimeo.com/video/{}", id))?
        }
        _ => parsed.to_string(),
    };

    let candidate_url = Url::parse(&candidate).ok()?;
    let origin = candidate_url.origin().ascii_serialization();
    allowed
        .iter()
        .any(|a| a.trim_end_matches('/') == origin)
        .then_some(candidate)
}
