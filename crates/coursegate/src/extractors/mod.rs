pub mod admin_user;
pub mod auth_user;
pub mod json;
pub mod pagination;

pub use admin_user::{AdminUser, CurrentUser};
pub use auth_user::AuthUser;
pub use json::{Json, ValidatedJson};
pub use pagination::Pagination;
