//! Request extractors: authentication and request metadata.

pub mod auth;
pub mod meta;

pub use auth::{AuthUser, SseAuthUser};
pub use meta::RequestMeta;
