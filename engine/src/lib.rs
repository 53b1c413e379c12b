//! SwiftSense measurement engine
//!
//! Measurement routines for internet latency, download/upload throughput and
//! simulated wireless link quality, plus the orchestration, history and
//! analysis-service seams the client builds on. Nothing in here speaks HTTP:
//! transports, hint sources, stores and analysis backends are injected.

pub mod cancel;
pub mod constants;
pub mod error;
pub mod history;
pub mod latency;
pub mod link;
pub mod orchestrator;
pub mod sampling;
pub mod service;
pub mod throughput;
pub mod transport;
pub mod types;

pub use cancel::CancelToken;
pub use error::{MeasureError, ServiceError};
pub use history::{History, HistoryStore, MemoryStore};
pub use orchestrator::{EngineSettings, Event, InternetRun, Orchestrator};
pub use sampling::{LiveBuffer, SampleStream};
pub use service::{AnalysisService, AnalysisSubject};
pub use transport::{ChunkSource, DownlinkHint, Transport};
pub use types::*;
