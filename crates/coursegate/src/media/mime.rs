use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

/// Canonical MIME types for the document formats the platform accepts.
const DOCUMENT_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
];

pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "txt", "csv",
];

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "mkv", "ogv"];

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// MIME type for a stored document: the recorded type when it is specific,
/// else the extension table, else `application/octet-stream`.
pub fn document_mime(stored: Option<&str>, file_name: &str) -> String {
    if let Some(mime) = stored.map(str::trim).filter(|m| !m.is_empty() && *m != OCTET_STREAM) {
        return mime.to_string();
    }
    extension(file_name)
        .and_then(|ext| {
            DOCUMENT_TYPES
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, mime)| mime.to_string())
        })
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

/// MIME type for a stored video, falling back to a guess from the name.
pub fn video_mime(stored: Option<&str>, file_name: &str) -> String {
    if let Some(mime) = stored.map(str::trim).filter(|m| m.starts_with("video/")) {
        return mime.to_string();
    }
    mime_guess::from_path(file_name)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::VIDEO)
        .map(|m| m.to_string())
        .unwrap_or_else(|| "video/mp4".to_string())
}

/// Spreadsheets are download-only.
pub fn is_spreadsheet(mime: &str) -> bool {
    mime == "application/vnd.ms-excel"
        || mime == "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        || mime == "text/csv"
}

/// `Content-Disposition` value for serving `file_name` with type `mime`.
pub fn content_disposition(mime: &str, file_name: &str) -> String {
    let kind = if is_spreadsheet(mime) {
        "attachment"
    } else {
        "inline"
    };
    format!("{}; filename=\"{}\"", kind, header_safe_name(file_name))
}

/// Printable ASCII only, without quotes or backslashes.
fn header_safe_name(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    if safe.trim().is_empty() {
        "download".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_table_fallback() {
        assert_eq!(document_mime(None, "notes.PDF"), "application/pdf");
        assert_eq!(
            document_mime(Some("application/octet-stream"), "deck.pptx"),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        );
        assert_eq!(document_mime(Some(""), "data.csv"), "text/csv");
        assert_eq!(document_mime(None, "archive.zip"), OCTET_STREAM);
        assert_eq!(document_mime(None, "README"), OCTET_STREAM);
    }

    #[test]
    fn stored_mime_wins() {
        assert_eq!(document_mime(Some("text/markdown"), "x.pdf"), "text/markdown");
    }

    #[test]
    fn spreadsheets_download_everything_else_inline() {
        let xlsx = document_mime(None, "grades.xlsx");
        assert!(content_disposition(&xlsx, "grades.xlsx").starts_with("attachment;"));
        assert!(content_disposition("application/vnd.ms-excel", "a.xls").starts_with("attachment;"));
        assert_eq!(
            content_disposition("application/pdf", "Week \"1\".pdf"),
            "inline; filename=\"Week _1_.pdf\""
        );
    }

    #[test]
    fn video_fallbacks() {
        assert_eq!(video_mime(Some("video/webm"), "a.mp4"), "video/webm");
        assert_eq!(video_mime(None, "clip.webm"), "video/webm");
        assert_eq!(video_mime(Some("application/octet-stream"), "blob"), "video/mp4");
    }
}
