//! Conversational layer for the farm assistant.
//!
//! A manager routes each query to one of five sub-agents (market, finance,
//! weather, plant disease, government schemes). Market and finance questions
//! are answered by tools that call the same [`farmlink_core::MarketEngine`]
//! the HTTP API uses, so no transaction logic lives here.
//!
//! # Modules
//!
//! - `router` - keyword routing and free-text to tool-call mapping
//! - `tools` - the `Tool` trait and registry
//! - `market_tools`, `finance_tools` - tool implementations
//! - `market_price` - mandi price source and the data.gov.in client
//! - `remote` - hosted reasoning engine client and stream aggregation
//! - `runtime` - `AgentRuntime`, which ties the pieces together

pub mod finance_tools;
pub mod market_price;
pub mod market_tools;
pub mod remote;
pub mod router;
pub mod runtime;
pub mod tools;

pub use market_price::{DataGovPriceClient, MarketPriceSource};
pub use remote::{ReasoningEngine, RemoteReasoningEngine};
pub use router::SubAgent;
pub use runtime::{AgentReply, AgentRequest, AgentRuntime};
