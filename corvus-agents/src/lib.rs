//! Corvus Agents
//!
//! Investigation agents and the plumbing around them:
//! - **Backend**: LLM abstraction (OpenAI-compatible APIs, Anthropic)
//! - **Executor**: the single-call `run(instruction) -> text` contract the
//!   orchestrator depends on
//! - **Capabilities**: static metadata for discovery and keyword routing
//! - **Registry**: explicit agent registry, constructed once and passed by
//!   reference (no global state, so tests can build isolated registries)
//! - **Specialists**: the built-in LLM-prompted agents (search, dorking,
//!   threat intel, IOC analysis, username research)

pub mod backend;
pub mod capability;
pub mod executor;
pub mod registry;
pub mod specialists;

pub use backend::*;
pub use capability::*;
pub use executor::*;
pub use registry::*;
pub use specialists::*;
