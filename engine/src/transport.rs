//! Seams between the measurement routines and the outside world

use crate::error::MeasureError;
use std::future::Future;

/// Network operations the probes rely on.
///
/// Implementations own endpoint selection and cache busting; the routines
/// only time the calls.
pub trait Transport {
    type Body: ChunkSource + Send;

    /// One lightweight round trip
    fn round_trip(&self) -> impl Future<Output = Result<(), MeasureError>> + Send;

    /// Start fetching the bulk download payload
    fn open_download(&self) -> impl Future<Output = Result<Self::Body, MeasureError>> + Send;

    /// Send `payload` in a single request and wait for the response
    fn upload(&self, payload: Vec<u8>) -> impl Future<Output = Result<(), MeasureError>> + Send;
}

/// Incrementally consumed response body
pub trait ChunkSource {
    /// Size of the next delivered chunk, `None` at end of stream
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<usize>, MeasureError>> + Send;
}

/// Platform-exposed downlink bandwidth estimate
pub trait DownlinkHint {
    /// Estimated downlink in Mbps, if the platform exposes one
    fn downlink_mbps(&self) -> Option<f64>;
}

impl DownlinkHint for Option<f64> {
    fn downlink_mbps(&self) -> Option<f64> {
        *self
    }
}
