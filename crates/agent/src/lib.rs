//! Agent runtime client for burn-plan generation.
//!
//! The crate talks to a hosted LLM agent runtime and turns its replies into
//! validated [`billburn_core::SpendingAnalysis`] values:
//!
//! 1. **Transport** (`transport`) - HTTP invocation with bearer or SigV4 auth
//! 2. **Client** (`client`) - failure classification and retry with backoff
//! 3. **Extraction** (`extract`) - reply envelope unwrapping and schema decoding
//! 4. **Planner** (`planner`) - prompt building, cost and invariant checks
//!
//! The model invents the scenario; the numbers it returns are never trusted
//! until they pass the cost tolerance and the line-item invariants.

pub mod client;
pub mod extract;
pub mod planner;
pub mod transport;

pub use client::{AgentClient, AgentError, RetryPolicy};
pub use planner::BurnPlanner;
pub use transport::{AgentTransport, HttpAgentTransport, TransportError};
