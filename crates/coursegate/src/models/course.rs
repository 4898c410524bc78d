use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Course entity: a purchasable bundle of content items.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    /// Stable identifier used by the import label table
    #[sea_orm(unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Price in minor currency units; 0 means free
    pub price: i64,

    pub is_active: bool,

    pub enrollment_count: i32,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseResponse {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: i64,
    pub is_active: bool,
    pub enrollment_count: i32,
    pub created_at: String,
}

impl From<Model> for CourseResponse {
    fn from(m: Model) -> Self {
        CourseResponse {
            id: m.id,
            title: m.title,
            slug: m.slug,
            description: m.description,
            price: m.price,
            is_active: m.is_active,
            enrollment_count: m.enrollment_count,
            created_at: m.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

/// Lowercase, hyphen-separated slug from a title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Basics of Trading"), "basics-of-trading");
        assert_eq!(slugify("  Options -- 101! "), "options-101");
        assert_eq!(slugify("***"), "");
    }
}
