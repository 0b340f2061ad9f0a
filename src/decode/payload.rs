//! The asynchronous payload-decode boundary.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::decode::image::{PreparedImage, decode_image};
use crate::events::model::{RefKind, SerializedRef};
use crate::foundation::error::{ReplayError, ReplayResult};

/// A decoded payload, directly usable by the mutation applier.
#[derive(Clone, Debug)]
pub enum DecodedPayload {
    /// Decoded raster image.
    Image(Arc<PreparedImage>),
    /// Raw bytes passed through undecoded.
    Bytes(Arc<Vec<u8>>),
}

/// Collaborator that resolves a [`SerializedRef`] into a usable payload.
///
/// This is the suspension point of the replay engine: implementations may
/// fetch payloads from anywhere. Failures are reported and degrade to a
/// skipped mutation; they are never fatal to the session.
#[async_trait]
pub trait PayloadDecoder: Send + Sync {
    /// Fetch and decode one referenced payload.
    async fn decode(&self, reference: &SerializedRef) -> ReplayResult<DecodedPayload>;
}

/// Default decoder for payloads carried inline as base64.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineDecoder;

#[async_trait]
impl PayloadDecoder for InlineDecoder {
    async fn decode(&self, reference: &SerializedRef) -> ReplayResult<DecodedPayload> {
        let bytes = BASE64
            .decode(reference.payload.as_bytes())
            .map_err(|e| ReplayError::decode(format!("invalid base64 payload: {e}")))?;
        match reference.kind {
            RefKind::Image => Ok(DecodedPayload::Image(Arc::new(decode_image(&bytes)?))),
            RefKind::Bytes => Ok(DecodedPayload::Bytes(Arc::new(bytes))),
        }
    }
}
