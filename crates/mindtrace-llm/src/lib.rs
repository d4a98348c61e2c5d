pub mod error;
pub mod gateway;
pub mod gemini;
pub mod groq;
pub mod mock;
pub mod normalize;
pub mod provider;
pub mod request;

pub use error::GatewayError;
pub use gateway::{Gateway, GatewayConfig};
pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use provider::{ProviderCallError, ProviderClient, ProviderId, ProviderSettings};
pub use request::{LlmRequest, LlmResponse, MOCK_PROVIDER, Payload, ResponseFormat, TaskType};
