mod chat;
mod provider;

pub use chat::GeminiChatModel;
pub use provider::GeminiProvider;
