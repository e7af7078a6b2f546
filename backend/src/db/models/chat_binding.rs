/// Association between a Telegram user name and the chat the bot talks to them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBinding {
    pub user_name: String,
    pub chat_id: i64,
}
