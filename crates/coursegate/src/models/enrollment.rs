use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Enrollment entity: links a user to a course.
///
/// Content access requires `payment_status == "completed"`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    pub course_id: i32,

    /// "pending", "completed" or "failed"
    pub payment_status: String,

    /// Amount charged in minor currency units
    pub amount_paid: i64,

    /// Order identifier issued by the payment gateway
    pub payment_order_id: Option<String>,

    pub coupon_id: Option<i32>,

    /// "purchase", "free" or "import"
    pub source: String,

    /// Completion percentage, 0..=100
    pub progress: i32,

    pub is_completed: bool,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentStatus> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentSource {
    Purchase,
    Free,
    Import,
}

impl EnrollmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentSource::Purchase => "purchase",
            EnrollmentSource::Free => "free",
            EnrollmentSource::Import => "import",
        }
    }
}

impl Model {
    pub fn status(&self) -> Option<PaymentStatus> {
        PaymentStatus::parse(&self.payment_status)
    }

    pub fn is_paid(&self) -> bool {
        self.status() == Some(PaymentStatus::Completed)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResponse {
    pub id: i32,
    pub course_id: i32,
    pub payment_status: String,
    pub amount_paid: i64,
    pub progress: i32,
    pub is_completed: bool,
    pub created_at: String,
}

impl From<Model> for EnrollmentResponse {
    fn from(m: Model) -> Self {
        EnrollmentResponse {
            id: m.id,
            course_id: m.course_id,
            payment_status: m.payment_status,
            amount_paid: m.amount_paid,
            progress: m.progress,
            is_completed: m.is_completed,
            created_at: m.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}
