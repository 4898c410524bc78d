use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::error::ApiError;
use crate::models::enrollment::{self, PaymentStatus};
use crate::models::{content_item, course, user};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntitlementError {
    #[error("NotEnrolled")]
    NotEnrolled,
    #[error("Course is not available")]
    CourseInactive,
    #[error("Account is disabled")]
    AccountDisabled,
}

impl From<EntitlementError> for ApiError {
    fn from(e: EntitlementError) -> Self {
        ApiError::Forbidden(e.to_string())
    }
}

/// Why access was granted.
#[derive(Debug, Clone, PartialEq)]
pub enum Grant {
    Enrolled(enrollment::Model),
    Admin,
}

/// A granted request for one content item, with the records that justified it.
#[derive(Debug, Clone)]
pub struct Entitlement {
    pub user: user::Model,
    pub content: content_item::Model,
    pub course: course::Model,
    pub grant: Grant,
}

/// Decides whether a user may receive a content item.
///
/// Called when a media URL is issued and again when bytes are requested, so a
/// token cannot outlive the course being deactivated or the enrollment.
#[derive(Clone)]
pub struct EntitlementChecker {
    db: DatabaseConnection,
}

impl EntitlementChecker {
    pub fn new(db: DatabaseConnection) -> Self {
        EntitlementChecker { db }
    }

    /// Completed enrollment for `(user_id, course_id)`, if any.
    pub async fn completed_enrollment(
        &self,
        user_id: i32,
        course_id: i32,
    ) -> Result<Option<enrollment::Model>, ApiError> {
        Ok(enrollment::Entity::find()
            .filter(enrollment::Column::UserId.eq(user_id))
            .filter(enrollment::Column::CourseId.eq(course_id))
            .filter(enrollment::Column::PaymentStatus.eq(PaymentStatus::Completed.as_str()))
            .one(&self.db)
            .await?)
    }

    /// Check that `user_id` may access `content_id`.
    ///
    /// Admins skip the enrollment requirement; everyone else needs a completed
    /// enrollment in the owning course. Free-preview flags do not count here.
    /// The owning course must be active for everyone.
    pub async fn check(&self, user_id: i32, content_id: i32) -> Result<Entitlement, ApiError> {
        let user = user::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;
        if !user.is_active {
            return Err(EntitlementError::AccountDisabled.into());
        }

        let content = content_item::Entity::find_by_id(content_id)
            .one(&self.db)
            .await?
            .filter(|c| c.is_active)
            .ok_or_else(|| ApiError::NotFound("Content not found".to_string()))?;

        let course = course::Entity::find_by_id(content.course_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;
        if !course.is_active {
            return Err(EntitlementError::CourseInactive.into());
        }

        let grant = if user.is_admin() {
            Grant::Admin
        } else if let Some(e) = self.completed_enrollment(user_id, course.id).await? {
            Grant::Enrolled(e)
        } else {
            tracing::debug!(user_id, content_id, course_id = course.id, "access denied: not enrolled");
            return Err(EntitlementError::NotEnrolled.into());
        };

        Ok(Entitlement {
            user,
            content,
            course,
            grant,
        })
    }
}
