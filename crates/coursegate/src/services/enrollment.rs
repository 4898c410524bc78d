use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::integrations::{OrderRequest, OrderStatus, PaymentGateway, PaymentOrder};
use crate::models::enrollment::{self, EnrollmentResponse, EnrollmentSource, PaymentStatus};
use crate::models::{coupon, course};

/// Atomically add one to a course's enrollment counter.
pub async fn increment_enrollment_count<C: ConnectionTrait>(
    conn: &C,
    course_id: i32,
) -> Result<(), ApiError> {
    course::Entity::update_many()
        .col_expr(
            course::Column::EnrollmentCount,
            Expr::col(course::Column::EnrollmentCount).add(1),
        )
        .filter(course::Column::Id.eq(course_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn increment_coupon_usage<C: ConnectionTrait>(
    conn: &C,
    coupon_id: Option<i32>,
) -> Result<(), ApiError> {
    if let Some(id) = coupon_id {
        coupon::Entity::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .filter(coupon::Column::Id.eq(id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

/// Flip a not-yet-completed enrollment to completed and bump the counters.
///
/// Returns `false` when the enrollment was already completed, so concurrent
/// callers count the enrollment exactly once.
async fn complete<C: ConnectionTrait>(
    conn: &C,
    enrollment: &enrollment::Model,
    amount_paid: i64,
) -> Result<bool, ApiError> {
    let now = Utc::now().naive_utc();
    let updated = enrollment::Entity::update_many()
        .col_expr(
            enrollment::Column::PaymentStatus,
            Expr::value(PaymentStatus::Completed.as_str()),
        )
        .col_expr(enrollment::Column::AmountPaid, Expr::value(amount_paid))
        .col_expr(enrollment::Column::UpdatedAt, Expr::value(now))
        .filter(enrollment::Column::Id.eq(enrollment.id))
        .filter(enrollment::Column::PaymentStatus.ne(PaymentStatus::Completed.as_str()))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        return Ok(false);
    }
    increment_enrollment_count(conn, enrollment.course_id).await?;
    increment_coupon_usage(conn, enrollment.coupon_id).await?;
    Ok(true)
}

async fn find_enrollment<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    course_id: i32,
) -> Result<Option<enrollment::Model>, ApiError> {
    Ok(enrollment::Entity::find()
        .filter(enrollment::Column::UserId.eq(user_id))
        .filter(enrollment::Column::CourseId.eq(course_id))
        .one(conn)
        .await?)
}

/// Insert or reset the single enrollment row for `(user_id, course_id)`.
#[allow(clippy::too_many_arguments)]
async fn upsert_pending<C: ConnectionTrait>(
    conn: &C,
    existing: Option<enrollment::Model>,
    user_id: i32,
    course_id: i32,
    source: EnrollmentSource,
    amount: i64,
    order_id: Option<String>,
    coupon_id: Option<i32>,
) -> Result<enrollment::Model, ApiError> {
    let now = Utc::now().naive_utc();
    let model = match existing {
        Some(e) => {
            let mut active: enrollment::ActiveModel = e.into();
            active.payment_status = Set(PaymentStatus::Pending.as_str().to_string());
            active.amount_paid = Set(amount);
            active.payment_order_id = Set(order_id);
            active.coupon_id = Set(coupon_id);
            active.source = Set(source.as_str().to_string());
            active.updated_at = Set(now);
            active.update(conn).await?
        }
        None => {
            enrollment::ActiveModel {
                user_id: Set(user_id),
                course_id: Set(course_id),
                payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
                amount_paid: Set(amount),
                payment_order_id: Set(order_id),
                coupon_id: Set(coupon_id),
                source: Set(source.as_str().to_string()),
                progress: Set(0),
                is_completed: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await?
        }
    };
    Ok(model)
}

/// Grant a completed, non-payment enrollment. Returns `false` when the user
/// already held a completed enrollment for the course.
pub async fn grant_enrollment(
    db: &DatabaseConnection,
    user_id: i32,
    course_id: i32,
    source: EnrollmentSource,
) -> Result<bool, ApiError> {
    let txn = db.begin().await?;
    let existing = find_enrollment(&txn, user_id, course_id).await?;
    if existing.as_ref().is_some_and(|e| e.is_paid()) {
        return Ok(false);
    }
    let pending = upsert_pending(&txn, existing, user_id, course_id, source, 0, None, None).await?;
    let granted = complete(&txn, &pending, 0).await?;
    txn.commit().await?;
    Ok(granted)
}

async fn resolve_coupon(
    db: &DatabaseConnection,
    code: &str,
    course_id: i32,
) -> Result<coupon::Model, ApiError> {
    let code = code.trim().to_uppercase();
    let coupon = coupon::Entity::find()
        .filter(coupon::Column::Code.eq(&code))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid coupon code".to_string()))?;
    coupon
        .usable_for(course_id, Utc::now().naive_utc())
        .map_err(|reason| ApiError::Validation(reason.to_string()))?;
    Ok(coupon)
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrollOutcome {
    /// Free (or fully discounted) course: access granted immediately.
    Enrolled { enrollment: EnrollmentResponse },
    /// Client must complete checkout for `order`, then call payment verify.
    PaymentRequired {
        enrollment: EnrollmentResponse,
        order: PaymentOrder,
    },
}

/// Enroll `user_id` in `course_id`, applying `coupon_code` when given.
pub async fn enroll(
    db: &DatabaseConnection,
    payments: &dyn PaymentGateway,
    currency: &str,
    user_id: i32,
    course_id: i32,
    coupon_code: Option<&str>,
) -> Result<EnrollOutcome, ApiError> {
    let course = course::Entity::find_by_id(course_id)
        .one(db)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    let existing = find_enrollment(db, user_id, course_id).await?;
    if existing.as_ref().is_some_and(|e| e.is_paid()) {
        return Err(ApiError::Conflict(
            "Already enrolled in this course".to_string(),
        ));
    }

    let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Some(resolve_coupon(db, code, course.id).await?),
        None => None,
    };
    let price = coupon
        .as_ref()
        .map_or(course.price, |c| c.apply(course.price));
    let coupon_id = coupon.as_ref().map(|c| c.id);

    if price == 0 {
        let txn = db.begin().await?;
        let pending = upsert_pending(
            &txn,
            existing,
            user_id,
            course.id,
            EnrollmentSource::Free,
            0,
            None,
            coupon_id,
        )
        .await?;
        complete(&txn, &pending, 0).await?;
        txn.commit().await?;

        let enrollment = enrollment::Entity::find_by_id(pending.id)
            .one(db)
            .await?
            .ok_or_else(|| ApiError::Internal("Enrollment vanished".to_string()))?;
        tracing::info!(user_id, course_id, "free enrollment completed");
        return Ok(EnrollOutcome::Enrolled {
            enrollment: enrollment.into(),
        });
    }

    let order = payments
        .create_order(OrderRequest {
            amount: price,
            currency: currency.to_string(),
            receipt: format!("enr-{}-{}-{}", user_id, course.id, Utc::now().timestamp()),
        })
        .await?;

    let enrollment = upsert_pending(
        db,
        existing,
        user_id,
        course.id,
        EnrollmentSource::Purchase,
        price,
        Some(order.id.clone()),
        coupon_id,
    )
    .await?;
    tracing::info!(user_id, course_id, order_id = %order.id, amount = price, "payment order issued");

    Ok(EnrollOutcome::PaymentRequired {
        enrollment: enrollment.into(),
        order,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerifyResult {
    Completed,
    AlreadyCompleted,
    Pending,
    Failed,
}

/// Ask the gateway about `order_id` and settle the matching enrollment.
/// Returns the settled enrollment when payment completed.
pub async fn verify_payment(
    db: &DatabaseConnection,
    payments: &dyn PaymentGateway,
    user_id: i32,
    order_id: &str,
) -> Result<(VerifyResult, enrollment::Model), ApiError> {
    let enrollment = enrollment::Entity::find()
        .filter(enrollment::Column::PaymentOrderId.eq(order_id))
        .filter(enrollment::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    if enrollment.is_paid() {
        return Ok((VerifyResult::AlreadyCompleted, enrollment));
    }

    let result = match payments.order_status(order_id).await? {
        OrderStatus::Paid => {
            let txn = db.begin().await?;
            let newly = complete(&txn, &enrollment, enrollment.amount_paid).await?;
            txn.commit().await?;
            if newly {
                tracing::info!(user_id, order_id, "payment verified; enrollment completed");
                VerifyResult::Completed
            } else {
                VerifyResult::AlreadyCompleted
            }
        }
        OrderStatus::Pending => VerifyResult::Pending,
        OrderStatus::Failed => {
            let mut active: enrollment::ActiveModel = enrollment.clone().into();
            active.payment_status = Set(PaymentStatus::Failed.as_str().to_string());
            active.updated_at = Set(Utc::now().naive_utc());
            active.update(db).await?;
            tracing::warn!(user_id, order_id, "payment failed");
            VerifyResult::Failed
        }
    };

    let enrollment = enrollment::Entity::find_by_id(enrollment.id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Internal("Enrollment vanished".to_string()))?;
    Ok((result, enrollment))
}
