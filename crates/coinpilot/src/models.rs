//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai-compatible messages/tools, sent from the agent to the LLM
//! - JSON-RPC tool requests, sent from the agent to the servers providing tools
//!
//! We always immediately convert those data models into the internal structs using
//! to/from helpers, so the internal models are not an exact match to either format.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
