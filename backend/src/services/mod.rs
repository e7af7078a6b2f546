pub mod init;
pub mod poll;
pub mod session;
pub mod session_store;
pub mod spotify;
pub mod telegram;
