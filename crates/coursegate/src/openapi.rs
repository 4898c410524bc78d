use utoipa::OpenApi;

use crate::auth::{Capability, IssuedToken};
use crate::controllers::auth::{
    AuthResponse, GoogleLoginRequest, LoginRequest, MessageResponse, PasswordResetConfirm,
    PasswordResetRequestPayload, SignupRequest,
};
use crate::controllers::chat::SendMessageRequest;
use crate::controllers::contents::{ContentResponse, ContentSummary, CourseContents, DeletedContent};
use crate::controllers::coupons::CreateCouponRequest;
use crate::controllers::courses::{CreateCourseRequest, UpdateCourseRequest};
use crate::controllers::enrollments::{
    EnrollRequest, MyEnrollment, VerifyPaymentRequest, VerifyPaymentResponse,
};
use crate::controllers::media::{RevokeRequest, RevokeResponse, SecureUrl};
use crate::error::ErrorDetail;
use crate::import::ImportSummary;
use crate::integrations::PaymentOrder;
use crate::models::chat_message::ChatMessageResponse;
use crate::models::content_item::{ContentType, StoredFile};
use crate::models::coupon::CouponResponse;
use crate::models::course::CourseResponse;
use crate::models::enrollment::{EnrollmentResponse, PaymentStatus};
use crate::models::user::{Role, UserResponse};
use crate::services::enrollment::{EnrollOutcome, VerifyResult};
use crate::services::progress::ProgressSummary;

/// OpenAPI document for every `/api` route.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "coursegate API",
        version = "0.3.0",
        description = "Course catalog, enrollments, token-gated media streaming and bulk user import."
    ),
    paths(
        crate::controllers::auth::signup,
        crate::controllers::auth::login,
        crate::controllers::auth::google_login,
        crate::controllers::auth::password_reset_request,
        crate::controllers::auth::password_reset_confirm,
        crate::controllers::auth::me,
        crate::controllers::courses::list_courses,
        crate::controllers::courses::get_course,
        crate::controllers::courses::create_course,
        crate::controllers::courses::update_course,
        crate::controllers::contents::list_contents,
        crate::controllers::contents::create_content,
        crate::controllers::contents::update_content,
        crate::controllers::contents::delete_content,
        crate::controllers::media::get_secure_url,
        crate::controllers::media::refresh_media_token,
        crate::controllers::media::stream_video,
        crate::controllers::media::serve_document,
        crate::controllers::media::embed_video,
        crate::controllers::media::revoke_token,
        crate::controllers::enrollments::enroll_in_course,
        crate::controllers::enrollments::verify,
        crate::controllers::enrollments::my_enrollments,
        crate::controllers::coupons::create_coupon,
        crate::controllers::progress::complete_content,
        crate::controllers::chat::send_message,
        crate::controllers::chat::my_conversation,
        crate::controllers::chat::user_stream,
        crate::controllers::chat::admin_messages,
        crate::controllers::chat::admin_reply,
        crate::controllers::chat::admin_stream,
        crate::controllers::import::import_users,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            GoogleLoginRequest,
            AuthResponse,
            PasswordResetRequestPayload,
            PasswordResetConfirm,
            MessageResponse,
            UserResponse,
            Role,
            CreateCourseRequest,
            UpdateCourseRequest,
            CourseResponse,
            ContentType,
            StoredFile,
            ContentResponse,
            ContentSummary,
            CourseContents,
            DeletedContent,
            SecureUrl,
            Capability,
            IssuedToken,
            RevokeRequest,
            RevokeResponse,
            EnrollRequest,
            EnrollOutcome,
            PaymentOrder,
            VerifyPaymentRequest,
            VerifyPaymentResponse,
            VerifyResult,
            EnrollmentResponse,
            PaymentStatus,
            MyEnrollment,
            CreateCouponRequest,
            CouponResponse,
            ProgressSummary,
            SendMessageRequest,
            ChatMessageResponse,
            ImportSummary,
            ErrorDetail,
        )
    ),
    tags(
        (name = "auth", description = "Accounts and sessions"),
        (name = "courses", description = "Course catalog"),
        (name = "contents", description = "Course content items"),
        (name = "media", description = "Secure media URLs and streaming"),
        (name = "enrollments", description = "Enrollment and payment"),
        (name = "progress", description = "Learner progress"),
        (name = "chat", description = "Live chat with the admin team"),
        (name = "admin", description = "Administration")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add JWT Bearer security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_media_and_import_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/media/secure-media/video",
            "/api/media/secure-url/{content_id}/{media_type}",
            "/api/admin/import/users",
            "/api/courses/{course_id}/contents",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "{} missing from the OpenAPI document",
                expected
            );
        }
    }

    #[test]
    fn declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
