pub mod orchestrator;
pub mod provider;
pub mod registry;

pub use orchestrator::OrchestratedModel;
pub use provider::{ChatMessage, ChatTransport, ModelBackend, OpenAiCompatClient};
pub use registry::{ModelRegistry, ProviderStatus};
