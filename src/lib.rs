pub mod assistant;
pub mod core;
pub mod guardrail;
pub mod llm;
pub mod retrieval;
