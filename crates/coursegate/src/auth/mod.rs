pub mod codes;
pub mod jwt;
pub mod media_token;
pub mod password;
pub mod password_reset;
pub mod revocation;

pub use codes::{generate_numeric_code, generate_secure_token, hash_token};
pub use jwt::{create_token, validate_token, Claims};
pub use media_token::{Capability, IssuedToken, MediaAccess, MediaTokenError, MediaTokens};
pub use password::{generate_temporary_password, hash_password, verify_password};
pub use revocation::RevocationRegistry;
