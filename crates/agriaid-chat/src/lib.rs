//! Conversation layer: a session that enriches each farmer message with
//! real-time context and sends it to a generation backend.

pub mod llm;
pub mod session;

pub use llm::{
    llm_timeout, normalize_ollama_host, BackendConfig, GenerationBackend, GenerationError,
    OllamaBackend, TokenStream,
};
pub use session::{
    build_prompt, ConversationSession, Dispatch, Message, Reply, Role, FALLBACK_REPLY,
    HISTORY_WINDOW,
};
