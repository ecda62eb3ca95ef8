mod chat;
mod provider;

pub use chat::ClaudeChatModel;
pub use provider::ClaudeProvider;
