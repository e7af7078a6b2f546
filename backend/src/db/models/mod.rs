//! Database models, one file per table.

pub mod chat_binding;
pub mod user;

pub use self::chat_binding::*;
pub use self::user::*;
