//! # conductor-core
//!
//! Scheduling and admission core for the multi-provider LLM conductor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Scheduler                               │
//! │  ┌─────────────┐  ┌─────────────┐  ┌───────────────────────┐   │
//! │  │  Admission  │  │   Key/Rate  │  │   ProviderAdapter      │   │
//! │  │   Queue     │──│   Buckets   │──│   (Strategy)           │   │
//! │  └─────────────┘  └─────────────┘  └───────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ProviderAdapter` trait enables adding new upstream LLM providers
//! without changing scheduling or rate-limiting logic.

pub mod bucket;
pub mod dto;
pub mod error;
pub mod model_map;
pub mod provider;
pub mod scheduler;

pub use bucket::{BucketStatus, RateBucket};
pub use dto::{
    BatchFailure, BatchRequest, BatchResponse, ChatCompletionChoice, ChatCompletionRequest,
    ChatCompletionResponse, ConductorStatus, Message, ModelListEntry, ModelListResponse,
    ProviderKeyStatus, Role, Usage,
};
pub use error::{ConductorError, Result};
pub use model_map::ModelMap;
pub use provider::{AdapterState, ProviderAdapter, ProviderKey};
pub use scheduler::{Scheduler, SchedulingStrategy, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MAX_WAIT_TIME};
