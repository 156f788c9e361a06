//! Generative backend layer
//!
//! Backends are strategies behind [`GenerativeBackend`]; [`select_backend`]
//! picks one from configuration and [`GenerativeClient`] wraps it with the
//! retry policy.

pub mod auth;
mod client;
mod error;
mod genai;
mod lazy;
mod mock;
mod ollama;
mod resilient;
mod selector;
mod simulator;
mod types;
mod vertex;

pub use client::{BackendKind, GenerativeBackend};
pub use error::{BackendError, GenerationError};
pub use genai::GenAiBackend;
pub use lazy::LazyBackend;
pub use mock::{MockGenerativeBackend, MockResponse};
pub use ollama::OllamaBackend;
pub use resilient::{GenerativeClient, DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_RETRIES};
pub use selector::{candidate_strategies, select_backend, SelectedBackend};
pub use simulator::SimulatorBackend;
pub use types::{Completion, GenerationRequest, ResponseFormat, TaskKind};
pub use vertex::VertexBackend;
