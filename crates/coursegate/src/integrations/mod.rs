//! Interfaces to the third-party collaborators, with HTTP implementations and
//! fallbacks for when a collaborator is not configured.

pub mod email;
pub mod identity;
pub mod payment;
pub mod realtime;

pub use email::{EmailMessage, EmailSender};
pub use identity::{IdentityProvider, VerifiedIdentity};
pub use payment::{OrderRequest, OrderStatus, PaymentGateway, PaymentOrder};
pub use realtime::{RealtimeEvent, RealtimeHub};
