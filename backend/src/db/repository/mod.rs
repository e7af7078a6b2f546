pub mod chat_binding;
pub mod user;

pub use chat_binding::ChatBindingRepository;
pub use user::UserRepository;
