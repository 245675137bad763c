// LLM abstraction layer

pub mod google;
pub mod openai_compatible;
pub mod provider;
pub mod sse;

pub use provider::*;
