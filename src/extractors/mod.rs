//! Request extractors and negotiation middleware.

pub mod media_type;
pub use media_type::{negotiate_accept, JsonApiBody};
