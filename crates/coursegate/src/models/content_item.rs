use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One unit of course material.
///
/// Each media slot (video, document) holds either an external URL or an
/// uploaded file, never both. The `*_file_path` columns store the randomized
/// name inside the uploads directory.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub course_id: i32,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// "video", "document", "pdf" or "spreadsheet"
    pub content_type: String,

    pub sort_order: i32,

    pub is_free_preview: bool,

    pub is_active: bool,

    pub video_url: Option<String>,
    pub video_file_path: Option<String>,
    pub video_file_name: Option<String>,
    pub video_file_size: Option<i64>,
    pub video_mime_type: Option<String>,

    pub document_url: Option<String>,
    pub document_file_path: Option<String>,
    pub document_file_name: Option<String>,
    pub document_file_size: Option<i64>,
    pub document_mime_type: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Document,
    Pdf,
    Spreadsheet,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Document => "document",
            ContentType::Pdf => "pdf",
            ContentType::Spreadsheet => "spreadsheet",
        }
    }

    pub fn parse(s: &str) -> Option<ContentType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Some(ContentType::Video),
            "document" => Some(ContentType::Document),
            "pdf" => Some(ContentType::Pdf),
            "spreadsheet" => Some(ContentType::Spreadsheet),
            _ => None,
        }
    }
}

/// Descriptor of an uploaded file as recorded on the content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredFile {
    pub stored_name: String,
    pub original_name: String,
    pub size: i64,
    pub mime_type: String,
}

/// Where the bytes of one media slot live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    External(String),
    Uploaded(StoredFile),
}

fn slot(
    url: &Option<String>,
    path: &Option<String>,
    name: &Option<String>,
    size: Option<i64>,
    mime: &Option<String>,
) -> Option<MediaSource> {
    if let Some(stored_name) = path.as_ref().filter(|p| !p.is_empty()) {
        return Some(MediaSource::Uploaded(StoredFile {
            stored_name: stored_name.clone(),
            original_name: name.clone().unwrap_or_else(|| stored_name.clone()),
            size: size.unwrap_or(0),
            mime_type: mime.clone().unwrap_or_default(),
        }));
    }
    url.as_ref()
        .filter(|u| !u.trim().is_empty())
        .map(|u| MediaSource::External(u.clone()))
}

impl Model {
    pub fn kind(&self) -> Option<ContentType> {
        ContentType::parse(&self.content_type)
    }

    pub fn video_source(&self) -> Option<MediaSource> {
        slot(
            &self.video_url,
            &self.video_file_path,
            &self.video_file_name,
            self.video_file_size,
            &self.video_mime_type,
        )
    }

    pub fn document_source(&self) -> Option<MediaSource> {
        slot(
            &self.document_url,
            &self.document_file_path,
            &self.document_file_name,
            self.document_file_size,
            &self.document_mime_type,
        )
    }

    /// Stored names of every uploaded file referenced by this item.
    pub fn stored_files(&self) -> Vec<String> {
        [&self.video_file_path, &self.document_file_path]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Model {
        let now = chrono::Utc::now().naive_utc();
        Model {
            id: 1,
            course_id: 1,
            title: "Intro".into(),
            description: None,
            content_type: "video".into(),
            sort_order: 0,
            is_free_preview: false,
            is_active: true,
            video_url: None,
            video_file_path: None,
            video_file_name: None,
            video_file_size: None,
            video_mime_type: None,
            document_url: None,
            document_file_path: None,
            document_file_name: None,
            document_file_size: None,
            document_mime_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn uploaded_file_wins_over_blank_url() {
        let mut m = item();
        m.video_url = Some("  ".into());
        m.video_file_path = Some("abc.mp4".into());
        m.video_file_size = Some(42);
        match m.video_source() {
            Some(MediaSource::Uploaded(f)) => {
                assert_eq!(f.stored_name, "abc.mp4");
                assert_eq!(f.original_name, "abc.mp4");
                assert_eq!(f.size, 42);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_slots_are_none() {
        let m = item();
        assert!(m.video_source().is_none());
        assert!(m.document_source().is_none());
        assert!(m.stored_files().is_empty());
    }

    #[test]
    fn content_type_parse_is_case_insensitive() {
        assert_eq!(ContentType::parse(" PDF "), Some(ContentType::Pdf));
        assert_eq!(ContentType::parse("audio"), None);
    }
}
