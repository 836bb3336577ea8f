//! parley-core - resilient dispatch of chat requests across LLM providers
//!
//! This crate provides:
//! - Conversation state shared by every provider that answers it
//! - Provider clients for OpenAI, Anthropic, Gemini, Groq and Ollama
//! - An error classifier that separates quota/transient failures from fatal ones
//! - A registry of configured providers in priority order
//! - A dispatcher that fails over between providers without duplicating history

pub mod classifier;
pub mod conversation;
pub mod dispatcher;
pub mod providers;
pub mod registry;

// Re-export main types for convenience
pub use classifier::{ErrorClass, classify};
pub use conversation::{Conversation, ConversationStats, Role, Turn};
pub use dispatcher::{
    AttemptOutcome, AttemptRecord, Completion, DEFAULT_MAX_RETRIES, DispatchError, Dispatcher,
};
pub use providers::{
    LlmProvider, ProviderError, ProviderKind, ProviderSettings, build_provider,
};
pub use registry::{
    ProviderDescriptor, ProviderRegistry, ProviderRegistryBuilder, RegisteredProvider,
    RegistryError,
};
