// Disaster assistant: the `/process` question-answering pipeline.
// All model calls go through llm_client; all provider calls go through feeds.

pub mod handlers;
pub mod pipeline;
pub mod prompts;
