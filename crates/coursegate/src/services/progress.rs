use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::enrollment::{self, PaymentStatus};
use crate::models::{content_item, progress_record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProgressSummary {
    pub course_id: i32,
    pub completed_items: u64,
    pub active_items: u64,
    pub progress: i32,
    pub is_completed: bool,
}

/// `round(100 * completed / active)`, capped at 100. A course without active
/// items reports 0.
///
/// Completed records are counted even for items that were later deactivated,
/// so adding or deactivating items changes the percentage of learners who had
/// already finished.
pub fn percentage(completed: u64, active: u64) -> i32 {
    if active == 0 {
        return 0;
    }
    let pct = ((completed as f64) * 100.0 / (active as f64)).round();
    pct.min(100.0) as i32
}

/// Record that `user_id` finished `content` (once) and refresh the enrollment.
pub async fn record_completion(
    db: &DatabaseConnection,
    user_id: i32,
    content: &content_item::Model,
) -> Result<ProgressSummary, ApiError> {
    let already = progress_record::Entity::find()
        .filter(progress_record::Column::UserId.eq(user_id))
        .filter(progress_record::Column::ContentId.eq(content.id))
        .one(db)
        .await?;

    if already.is_none() {
        progress_record::ActiveModel {
            user_id: Set(user_id),
            course_id: Set(content.course_id),
            content_id: Set(content.id),
            completed_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    recompute(db, user_id, content.course_id).await
}

/// Recompute the progress of `user_id` in `course_id` and store it on the
/// completed enrollment, when there is one.
pub async fn recompute(
    db: &DatabaseConnection,
    user_id: i32,
    course_id: i32,
) -> Result<ProgressSummary, ApiError> {
    let completed_items = progress_record::Entity::find()
        .filter(progress_record::Column::UserId.eq(user_id))
        .filter(progress_record::Column::CourseId.eq(course_id))
        .count(db)
        .await?;
    let active_items = content_item::Entity::find()
        .filter(content_item::Column::CourseId.eq(course_id))
        .filter(content_item::Column::IsActive.eq(true))
        .count(db)
        .await?;

    let progress = percentage(completed_items, active_items);
    let is_completed = progress == 100;

    let enrollment = enrollment::Entity::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::CourseId.eq(course_id))
        .filter(enrollment::Column::PaymentStatus.eq(PaymentStatus::Completed.as_str()))
        .one(db)
        .await?;

    if let Some(e) = enrollment {
        if e.progress != progress || e.is_completed != is_completed {
            let mut active: enrollment::ActiveModel = e.into();
            active.progress = Set(progress);
            active.is_completed = Set(is_completed);
            active.updated_at = Set(Utc::now().naive_utc());
            active.update(db).await?;
        }
    }

    Ok(ProgressSummary {
        course_id,
        completed_items,
        active_items,
        progress,
        is_completed,
    })
}

/// Remove every progress record that references `content_id`.
pub async fn delete_for_content(
    db: &DatabaseConnection,
    content_id: i32,
) -> Result<u64, ApiError> {
    let res = progress_record::Entity::delete_many()
        .filter(progress_record::Column::ContentId.eq(content_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::percentage;

    #[test]
    fn rounds_and_caps() {
        assert_eq!(percentage(0, 3), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(3, 3), 100);
        assert_eq!(percentage(5, 3), 100);
        assert_eq!(percentage(4, 0), 0);
    }
}
