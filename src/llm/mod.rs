pub mod openai;
pub mod parse;

pub use openai::{LlmClient, LlmConfig, LlmError, LlmMessage, Sampling};
pub use parse::{MalformedAiResponse, parse_fenced_json, strip_code_fence};
