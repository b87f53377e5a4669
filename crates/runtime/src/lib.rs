mod app;
pub mod chat;
pub mod generator;
pub mod prompt_builder;

pub use app::App;
pub use chat::ChatService;
pub use generator::{GenerateNoteRequest, NoteGenerationResponse, NoteGenerator};
