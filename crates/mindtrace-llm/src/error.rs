/// Terminal gateway failures. Rate limits, parse and schema failures
/// are absorbed by retry/fallback and only surface here through
/// `Exhausted` once every candidate is spent.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no llm provider available")]
    NoProviderAvailable,

    #[error("all providers exhausted after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: String },
}

pub type Result<T> = std::result::Result<T, GatewayError>;
