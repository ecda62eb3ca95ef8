mod chat;
mod provider;

pub use chat::GroqChatModel;
pub use provider::GroqProvider;
