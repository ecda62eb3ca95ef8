pub(crate) mod api;
mod model;

pub use model::OpenAIChatModel;
pub(crate) use model::stream_completion;
