//! Serde model of the recorded event stream.
//!
//! Events are immutable once recorded. The stream interleaves canvas mutations
//! with other recorded activity (DOM mutations, scrolls, viewport resizes);
//! only the canvas-mutation subsequence is replayed by this crate.

use serde::{Deserialize, Serialize};

/// Stable identity of a recorded canvas node, correlating to the external mirror.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CanvasId(pub u64);

/// One element of the recorded event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Recording timestamp in milliseconds.
    pub timestamp: u64,
    /// Event body, discriminated by `kind`.
    #[serde(flatten)]
    pub data: EventData,
}

/// Recorded event body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventData {
    /// A batch of draw calls against one recorded canvas.
    CanvasMutation(CanvasMutationData),
    /// A DOM mutation, opaque to this crate.
    DomMutation(serde_json::Value),
    /// A scroll event, opaque to this crate.
    Scroll(serde_json::Value),
    /// A viewport resize.
    ViewportResize {
        /// New viewport width in CSS pixels.
        width: u32,
        /// New viewport height in CSS pixels.
        height: u32,
    },
    /// Any other recorded payload, opaque to this crate.
    Custom(serde_json::Value),
}

/// Body of a canvas-mutation event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasMutationData {
    /// Target canvas identity.
    pub canvas_id: CanvasId,
    /// Batched or single draw call.
    #[serde(flatten)]
    pub payload: MutationPayload,
}

/// Draw-call payload of one mutation: a command batch or a single call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MutationPayload {
    /// Batched form: `{ "commands": [...] }`.
    Batch {
        /// Draw calls, in recorded order.
        commands: Vec<DrawCommand>,
    },
    /// Single-call form: `{ "method": ..., "args": [...] }`.
    Single(DrawCommand),
}

impl MutationPayload {
    /// Draw calls in recorded order, regardless of wire form.
    pub fn commands(&self) -> &[DrawCommand] {
        match self {
            Self::Batch { commands } => commands,
            Self::Single(cmd) => std::slice::from_ref(cmd),
        }
    }

    /// `true` when any argument is a [`SerializedRef`] needing asynchronous decode.
    pub fn needs_decode(&self) -> bool {
        self.commands()
            .iter()
            .any(|cmd| cmd.args.iter().any(|a| matches!(a, DrawArg::Ref(_))))
    }
}

/// One recorded draw call: a 2D-context method name and its arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrawCommand {
    /// 2D-context method name (`"fillRect"`, `"drawImage"`, ...), or a
    /// property name for property-set commands (`"fillStyle"`).
    pub method: String,
    /// Ordered argument list.
    #[serde(default)]
    pub args: Vec<DrawArg>,
}

/// One recorded draw-call argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DrawArg {
    /// Reference to an external binary/image payload, resolved before use.
    Ref(SerializedRef),
    /// Primitive or plain structured value, usable as recorded.
    Value(serde_json::Value),
}

/// Reference to an external payload carried inline as base64.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedRef {
    /// What the payload decodes to.
    pub kind: RefKind,
    /// Base64-encoded payload bytes.
    pub payload: String,
}

/// Decoded form of a [`SerializedRef`] payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// An encoded image (PNG, JPEG, ...), decoded to premultiplied RGBA8.
    Image,
    /// Raw bytes, passed through undecoded.
    Bytes,
}
