//! # Routeflow
//!
//! A staged request engine for a conversational map assistant.
//!
//! Every request flows through a fixed sequence of stages:
//!
//! - **Selection**: a mandatory one-shot stage deciding which stages run
//! - **Plan**: a streamed announcement, when anything was selected
//! - **Context, Data, Reasoning, Action**: one-shot stages, each only if selected
//! - **Summary**: a streamed final answer that always runs
//!
//! One-shot stages rotate across a pool of probed credentials on failure.
//! Stage failures are isolated into error events; only an empty credential
//! pool or a failed selection aborts a request. Results and tokens reach the
//! caller through a single ordered event stream.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use routeflow::prelude::*;
//!
//! let pipeline = Pipeline::builder()
//!     .with_unit_factory(Arc::new(MyUnitFactory::new()))
//!     .with_credentials(CredentialSet::from_env("GOOGLE_GENERATIVE_AI_API_KEY", 4))
//!     .with_config(PipelineConfig::from_env()?)
//!     .build()?;
//!
//! let mut events = pipeline.execute(PipelineRequest::from_query("coffee near me"));
//! while let Some(event) = events.next().await {
//!     println!("{}", event.to_wire());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod contracts;
pub mod core;
pub mod credentials;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod reasoning;
pub mod stages;
pub mod subpipeline;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{
        ChatMessage, GeoPoint, InMemoryStateLog, NoOpStateLog, PipelineRequest, Role,
        SharedState, StateLog, StateRecord,
    };
    pub use crate::contracts::{
        ActionReport, AgentKind, Contract, ContextIntent, DataPayload, DataReport,
        ReasoningDecision, SelectionDecision,
    };
    pub use crate::core::{PipelineEvent, PipelinePhase, StageMode, StageName, StageOutput};
    pub use crate::credentials::{
        Credential, CredentialPool, CredentialPoolManager, CredentialProbe, CredentialSet,
        FailureReason, ProbeOutcome, StreamingHealthProbe,
    };
    pub use crate::errors::{ReasoningError, RouteflowError};
    pub use crate::events::{
        CollectingEventSink, EventSink, EventStream, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        ErrorPolicy, Pipeline, PipelineBuilder, PipelineConfig, RetryPolicy, RunOutcome,
    };
    pub use crate::reasoning::{
        tasks, Prompt, ReasoningUnit, ReasoningUnitFactory, StreamRequest, TokenStream,
    };
    pub use crate::stages::{StageDescriptor, StageRegistry};
    pub use crate::utils::iso_timestamp;
}
