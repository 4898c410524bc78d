pub mod chat_message;
pub mod content_item;
pub mod coupon;
pub mod course;
pub mod enrollment;
pub mod progress_record;
pub mod security_token;
pub mod user;
