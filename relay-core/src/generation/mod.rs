//! Generation Orchestrator and Resume Coordinator

mod control;
mod drain;
mod events;
mod orchestrator;
mod resume;

pub use drain::{GenerationOutcome, IncompleteCause};
pub use events::{GENERIC_ERROR, GenerationEvent};
pub use orchestrator::{GenerationRequest, GenerationStream, Orchestrator};
pub use resume::ResumeRequest;
