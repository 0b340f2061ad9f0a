use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;

use canvas_replay::{
    CanvasId, DecodedPayload, ErrorReporter, HostNode, InlineDecoder, Mirror, PayloadDecoder,
    PlaceholderSurface, RecordedEvent, ReplayError, ReplayResult, ReplaySession,
    ReplaySessionOpts, SerializedRef, TracingReporter,
};

struct MockNode {
    canvas: bool,
    size: (u32, u32),
    mounted: Option<Arc<PlaceholderSurface>>,
}

impl MockNode {
    fn canvas(size: (u32, u32)) -> Self {
        Self {
            canvas: true,
            size,
            mounted: None,
        }
    }
}

impl HostNode for MockNode {
    fn is_canvas(&self) -> bool {
        self.canvas
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn mount(&mut self, placeholder: Arc<PlaceholderSurface>) {
        self.mounted = Some(placeholder);
    }
}

#[derive(Default)]
struct MockMirror {
    nodes: HashMap<CanvasId, MockNode>,
}

impl Mirror for MockMirror {
    fn node(&mut self, id: CanvasId) -> Option<&mut dyn HostNode> {
        self.nodes.get_mut(&id).map(|n| n as &mut dyn HostNode)
    }
}

/// Decoder wrapper counting calls into the inline decoder.
struct CountingDecoder {
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl PayloadDecoder for CountingDecoder {
    async fn decode(&self, reference: &SerializedRef) -> ReplayResult<DecodedPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        InlineDecoder.decode(reference).await
    }
}

/// Reporter that collects error strings for assertions.
#[derive(Default)]
struct CollectingReporter {
    seen: Mutex<Vec<String>>,
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, err: &ReplayError) {
        self.seen.lock().unwrap().push(err.to_string());
    }
}

fn png_base64_1x1(rgba: [u8; 4]) -> String {
    let img = image::RgbaImage::from_raw(1, 1, rgba.to_vec()).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    BASE64.encode(&buf)
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

fn event(value: serde_json::Value) -> RecordedEvent {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn prefetch_and_apply_decode_each_payload_once() {
    init_tracing();
    let payload = png_base64_1x1([0, 255, 0, 255]);
    let ev = event(json!({
        "timestamp": 100,
        "kind": "canvasMutation",
        "canvasId": 1,
        "method": "drawImage",
        "args": [{ "kind": "image", "payload": payload }, 0, 0]
    }));

    let decoder = Arc::new(CountingDecoder {
        calls: AtomicU32::new(0),
    });
    let mut session = ReplaySession::with_collaborators(
        std::slice::from_ref(&ev),
        decoder.clone(),
        Arc::new(TracingReporter),
        ReplaySessionOpts::default(),
    );

    let mut mirror = MockMirror::default();
    mirror.nodes.insert(CanvasId(1), MockNode::canvas((2, 2)));

    // Apply once (also triggers prefetch), then re-deliver after a scrub.
    session.on_event(&ev, true, &mut mirror).await;
    session.on_event(&ev, true, &mut mirror).await;

    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
    let frame = session.target_frame(CanvasId(1)).unwrap();
    assert_eq!(frame.pixel(0, 0), Some([0, 255, 0, 255]));
}

#[tokio::test]
async fn fill_then_clear_respects_recorded_order() {
    init_tracing();
    let fill = event(json!({
        "timestamp": 10,
        "kind": "canvasMutation",
        "canvasId": 5,
        "commands": [
            { "method": "fillStyle", "args": ["#ff0000"] },
            { "method": "fillRect", "args": [0, 0, 4, 4] }
        ]
    }));
    let clear = event(json!({
        "timestamp": 20,
        "kind": "canvasMutation",
        "canvasId": 5,
        "method": "clearRect",
        "args": [1, 1, 2, 2]
    }));

    let stream = vec![fill.clone(), clear.clone()];
    let mut session = ReplaySession::new(&stream, ReplaySessionOpts::default());
    let mut mirror = MockMirror::default();
    mirror.nodes.insert(CanvasId(5), MockNode::canvas((4, 4)));

    session.on_event(&fill, true, &mut mirror).await;
    session.on_event(&clear, true, &mut mirror).await;

    let frame = session.target_frame(CanvasId(5)).unwrap();
    // Cleared sub-region is transparent, the remainder keeps the fill.
    assert_eq!(frame.pixel(1, 1), Some([0, 0, 0, 0]));
    assert_eq!(frame.pixel(2, 2), Some([0, 0, 0, 0]));
    assert_eq!(frame.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(frame.pixel(3, 3), Some([255, 0, 0, 255]));
}

#[tokio::test]
async fn missing_mirror_node_is_a_silent_noop() {
    init_tracing();
    let ev = event(json!({
        "timestamp": 1,
        "kind": "canvasMutation",
        "canvasId": 99,
        "method": "fillRect",
        "args": [0, 0, 1, 1]
    }));

    let stream = vec![ev.clone()];
    let mut session = ReplaySession::new(&stream, ReplaySessionOpts::default());
    let mut mirror = MockMirror::default();

    session.on_event(&ev, true, &mut mirror).await;
    assert!(!session.has_target(CanvasId(99)));
}

#[tokio::test]
async fn target_tracks_source_dimensions_at_latest_apply() {
    init_tracing();
    let a = event(json!({
        "timestamp": 1,
        "kind": "canvasMutation",
        "canvasId": 2,
        "method": "fillRect",
        "args": [0, 0, 4, 4]
    }));
    let b = event(json!({
        "timestamp": 2,
        "kind": "canvasMutation",
        "canvasId": 2,
        "method": "fillRect",
        "args": [0, 0, 1, 1]
    }));

    let stream = vec![a.clone(), b.clone()];
    let mut session = ReplaySession::new(&stream, ReplaySessionOpts::default());
    let mut mirror = MockMirror::default();
    mirror.nodes.insert(CanvasId(2), MockNode::canvas((4, 4)));

    session.on_event(&a, true, &mut mirror).await;
    let frame = session.target_frame(CanvasId(2)).unwrap();
    assert_eq!((frame.width, frame.height), (4, 4));

    // The recorded page resized the canvas between mutations.
    mirror.nodes.get_mut(&CanvasId(2)).unwrap().size = (2, 6);
    session.on_event(&b, true, &mut mirror).await;
    let frame = session.target_frame(CanvasId(2)).unwrap();
    assert_eq!((frame.width, frame.height), (2, 6));
}

#[tokio::test]
async fn placeholder_is_mounted_and_receives_frames() {
    init_tracing();
    let ev = event(json!({
        "timestamp": 7,
        "kind": "canvasMutation",
        "canvasId": 3,
        "commands": [
            { "method": "fillStyle", "args": ["blue"] },
            { "method": "fillRect", "args": [0, 0, 2, 2] }
        ]
    }));

    let stream = vec![ev.clone()];
    let mut session = ReplaySession::new(&stream, ReplaySessionOpts::default());
    let mut mirror = MockMirror::default();
    mirror.nodes.insert(CanvasId(3), MockNode::canvas((2, 2)));

    // Tree reconstruction announces the canvas node; the engine mounts the
    // placeholder on it.
    let node = mirror.nodes.get_mut(&CanvasId(3)).unwrap();
    session.on_node_built(CanvasId(3), node);
    let placeholder = mirror.nodes[&CanvasId(3)].mounted.clone().unwrap();
    assert!(placeholder.frame().is_none());

    session.on_event(&ev, true, &mut mirror).await;
    let frame = placeholder.frame().unwrap();
    assert_eq!(frame.pixel(1, 1), Some([0, 0, 255, 255]));
}

#[tokio::test]
async fn bad_draw_call_is_reported_and_batch_continues() {
    init_tracing();
    let ev = event(json!({
        "timestamp": 1,
        "kind": "canvasMutation",
        "canvasId": 1,
        "commands": [
            { "method": "fillStyle", "args": ["#00ff00"] },
            { "method": "bezierCurveTo", "args": [0, 0, 1, 1, 2, 2] },
            { "method": "fillRect", "args": [0, 0, 1, 1] }
        ]
    }));

    let reporter = Arc::new(CollectingReporter::default());
    let stream = vec![ev.clone()];
    let mut session = ReplaySession::with_collaborators(
        &stream,
        Arc::new(InlineDecoder),
        reporter.clone(),
        ReplaySessionOpts::default(),
    );
    let mut mirror = MockMirror::default();
    mirror.nodes.insert(CanvasId(1), MockNode::canvas((1, 1)));

    session.on_event(&ev, true, &mut mirror).await;

    let seen = reporter.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("bezierCurveTo"));
    drop(seen);

    // The rest of the batch still applied.
    let frame = session.target_frame(CanvasId(1)).unwrap();
    assert_eq!(frame.pixel(0, 0), Some([0, 255, 0, 255]));
}

#[tokio::test]
async fn decode_failure_skips_mutation_and_is_reported() {
    init_tracing();
    let bad = event(json!({
        "timestamp": 1,
        "kind": "canvasMutation",
        "canvasId": 4,
        "method": "drawImage",
        "args": [{ "kind": "image", "payload": "%%% not base64 %%%" }, 0, 0]
    }));

    let reporter = Arc::new(CollectingReporter::default());
    let stream = vec![bad.clone()];
    let mut session = ReplaySession::with_collaborators(
        &stream,
        Arc::new(InlineDecoder),
        reporter.clone(),
        ReplaySessionOpts::default(),
    );
    let mut mirror = MockMirror::default();
    mirror.nodes.insert(CanvasId(4), MockNode::canvas((2, 2)));

    session.on_event(&bad, true, &mut mirror).await;

    assert!(!session.has_target(CanvasId(4)));
    assert!(
        reporter
            .seen
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.contains("decode error"))
    );
}

#[tokio::test]
async fn state_converges_after_sync_replay_of_a_seek() {
    init_tracing();
    // Simulate a scrub: the driver fast-forwards by re-delivering the canvas
    // events up to the new position with is_sync = true.
    let events: Vec<RecordedEvent> = (0..6)
        .map(|i| {
            event(json!({
                "timestamp": 10 * i,
                "kind": "canvasMutation",
                "canvasId": 1,
                "commands": [
                    { "method": "fillStyle", "args": [if i % 2 == 0 { "#ff0000" } else { "#0000ff" }] },
                    { "method": "fillRect", "args": [i, 0, 1, 1] }
                ]
            }))
        })
        .collect();

    let mut session = ReplaySession::new(&events, ReplaySessionOpts::default());
    let mut mirror = MockMirror::default();
    mirror.nodes.insert(CanvasId(1), MockNode::canvas((6, 1)));

    for ev in &events {
        session.on_event(ev, true, &mut mirror).await;
    }

    let frame = session.target_frame(CanvasId(1)).unwrap();
    for i in 0..6u32 {
        let expected = if i % 2 == 0 {
            [255, 0, 0, 255]
        } else {
            [0, 0, 255, 255]
        };
        assert_eq!(frame.pixel(i, 0), Some(expected), "column {i}");
    }
}

#[tokio::test]
async fn teardown_clears_session_state() {
    init_tracing();
    let ev = event(json!({
        "timestamp": 1,
        "kind": "canvasMutation",
        "canvasId": 1,
        "method": "fillRect",
        "args": [0, 0, 1, 1]
    }));

    let stream = vec![ev.clone()];
    let mut session = ReplaySession::new(&stream, ReplaySessionOpts::default());
    let mut mirror = MockMirror::default();
    mirror.nodes.insert(CanvasId(1), MockNode::canvas((1, 1)));

    session.on_event(&ev, true, &mut mirror).await;
    assert!(session.has_target(CanvasId(1)));

    session.teardown();
    assert!(!session.has_target(CanvasId(1)));
    assert!(session.placeholder(CanvasId(1)).is_none());
}
