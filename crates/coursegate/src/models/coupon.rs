use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Percentage discount code.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Stored upper-case
    #[sea_orm(unique)]
    pub code: String,

    /// 1..=100
    pub discount_percent: i32,

    /// Restricts the coupon to one course when set
    pub course_id: Option<i32>,

    pub is_active: bool,

    pub max_uses: Option<i32>,

    pub used_count: i32,

    pub expires_at: Option<NaiveDateTime>,

    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the coupon can be applied to `course_id` at `now`.
    pub fn usable_for(&self, course_id: i32, now: NaiveDateTime) -> Result<(), &'static str> {
        if !self.is_active {
            return Err("Coupon is no longer active");
        }
        if self.expires_at.is_some_and(|exp| exp < now) {
            return Err("Coupon has expired");
        }
        if self.max_uses.is_some_and(|max| self.used_count >= max) {
            return Err("Coupon usage limit reached");
        }
        if self.course_id.is_some_and(|c| c != course_id) {
            return Err("Coupon does not apply to this course");
        }
        Ok(())
    }

    /// Price after discount, never negative.
    pub fn apply(&self, price: i64) -> i64 {
        let percent = i64::from(self.discount_percent.clamp(0, 100));
        (price - price * percent / 100).max(0)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponResponse {
    pub id: i32,
    pub code: String,
    pub discount_percent: i32,
    pub course_id: Option<i32>,
    pub is_active: bool,
    pub max_uses: Option<i32>,
    pub used_count: i32,
}

impl From<Model> for CouponResponse {
    fn from(m: Model) -> Self {
        CouponResponse {
            id: m.id,
            code: m.code,
            discount_percent: m.discount_percent,
            course_id: m.course_id,
            is_active: m.is_active,
            max_uses: m.max_uses,
            used_count: m.used_count,
        }
    }
}
