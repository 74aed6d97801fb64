//! LLM integration for cdp-console.
//!
//! Provides a client for OpenAI-compatible chat completion APIs (LiteLLM
//! proxies, OpenRouter) behind the [`LlmProvider`] trait, so the agent layer
//! can be exercised with mock providers in tests.
//!
//! ```ignore
//! use cdp_console::llm::{LiteLlmClient, LlmProvider, Message, GenerationRequest};
//!
//! let client = LiteLlmClient::new_with_defaults(api_key);
//! let request = GenerationRequest::new("", vec![Message::user("Hello")]);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_API_BASE, DEFAULT_MODEL,
};
