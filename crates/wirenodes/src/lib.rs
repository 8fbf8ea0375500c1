//! Standard behavior library
//!
//! Collection of built-in behaviors for common operations

mod control;
mod http;
mod io;
mod llm;
mod media;
mod services;
mod transform;

pub use control::IfElseBehavior;
pub use http::HttpRequestBehavior;
pub use io::{InputBehavior, OutputBehavior, StaticTextBehavior};
pub use llm::{LlmChatBehavior, StructuredLlmBehavior};
pub use media::{
    ImageGenerateBehavior, PdfTextBehavior, TextToSpeechBehavior, TranscribeBehavior,
};
pub use services::{AgentExecutorBehavior, NotebookChatBehavior, NotebookWriteBehavior};
pub use transform::{CombineTextBehavior, JsonParseBehavior};
use std::sync::Arc;
use wireruntime::BehaviorRegistry;

/// Register all standard behaviors with a registry
pub fn register_all(registry: &BehaviorRegistry) {
    registry.register("input", Arc::new(InputBehavior));
    registry.register("output", Arc::new(OutputBehavior));
    registry.register("static-text", Arc::new(StaticTextBehavior));
    registry.register("json-parse", Arc::new(JsonParseBehavior));
    registry.register("combine-text", Arc::new(CombineTextBehavior));
    registry.register("if-else", Arc::new(IfElseBehavior));
    registry.register("http-request", Arc::new(HttpRequestBehavior::new()));
    registry.register("llm-chat", Arc::new(LlmChatBehavior::new()));
    registry.register("structured-llm", Arc::new(StructuredLlmBehavior::new()));
    registry.register("pdf-text", Arc::new(PdfTextBehavior));
    registry.register("transcribe-audio", Arc::new(TranscribeBehavior::new()));
    registry.register("image-generate", Arc::new(ImageGenerateBehavior::new()));
    registry.register("text-to-speech", Arc::new(TextToSpeechBehavior::new()));
    registry.register("agent-executor", Arc::new(AgentExecutorBehavior::new()));
    registry.register("notebook-write", Arc::new(NotebookWriteBehavior::new()));
    registry.register("notebook-chat", Arc::new(NotebookChatBehavior::new()));
}
