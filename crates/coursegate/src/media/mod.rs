//! Media delivery: byte ranges, content types, protective headers and the
//! responder that streams files or wraps external players.

pub mod headers;
pub mod mime;
pub mod range;
pub mod responder;

pub use range::{parse_range, ByteRange};
pub use responder::{embed_source, MediaResponder};
