//! Replays one resolved mutation onto its off-screen target and publishes the
//! result to the bound placeholder.

use std::sync::Arc;

use crate::decode::cache::{DeserializationCache, ResolvedArg, ResolvedCommand};
use crate::events::classify::CanvasEvent;
use crate::foundation::error::{ReplayError, ReplayResult};
use crate::host::{ErrorReporter, Mirror};
use crate::registry::{CanvasRegistry, CanvasTarget};

/// Applies canvas mutations in recorded order.
///
/// Every failure degrades: an unresolvable mutation is skipped (already
/// reported by the cache), a missing mirror node is an expected no-op, and a
/// bad draw call is reported and skipped without aborting its batch.
pub(crate) struct MutationApplier {
    cache: Arc<DeserializationCache>,
    reporter: Arc<dyn ErrorReporter>,
}

impl MutationApplier {
    pub(crate) fn new(
        cache: Arc<DeserializationCache>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self { cache, reporter }
    }

    pub(crate) async fn apply(
        &self,
        event: &CanvasEvent,
        mirror: &mut dyn Mirror,
        registry: &mut CanvasRegistry,
    ) {
        let Ok(resolved) = self.cache.resolve(event).await else {
            // Reported by the cache; the frame stays visually incomplete.
            return;
        };

        let Some(node) = mirror.node(event.canvas_id) else {
            // The node has not been mounted in the reconstructed tree yet.
            tracing::debug!(canvas = event.canvas_id.0, "mirror miss, skipping apply");
            return;
        };
        if !node.is_canvas() {
            tracing::debug!(canvas = event.canvas_id.0, "mirror node is not a canvas");
            return;
        }

        let (width, height) = node.size();
        let target = registry.get_or_create_target(event.canvas_id, (width, height));
        // Dimension changes between mutations are expected; re-apply every time.
        target.surface.resize(width, height);

        for command in &resolved.commands {
            if let Err(err) = replay_command(target, command) {
                self.reporter.report(&err);
            }
        }
        let frame = Arc::new(target.surface.snapshot());

        if let Some(placeholder) = registry.placeholder(event.canvas_id) {
            placeholder.present(frame);
        }
    }
}

fn replay_command(target: &mut CanvasTarget, command: &ResolvedCommand) -> ReplayResult<()> {
    let args = command.args.as_slice();
    match command.method.as_str() {
        "fillStyle" => {
            target.state.fill = crate::surface::color::parse_style(str_arg(args, 0)?)?;
        }
        "strokeStyle" => {
            target.state.stroke = crate::surface::color::parse_style(str_arg(args, 0)?)?;
        }
        "globalAlpha" => {
            target.state.global_alpha = num_arg(args, 0)?.clamp(0.0, 1.0);
        }
        "lineWidth" => {
            target.state.line_width = num_arg(args, 0)?.max(0.0);
        }
        "save" => target.state.save(),
        "restore" => target.state.restore(),
        "fillRect" => {
            let color = target.state.fill.to_premul(target.state.global_alpha);
            target.surface.fill_rect(
                num_arg(args, 0)?,
                num_arg(args, 1)?,
                num_arg(args, 2)?,
                num_arg(args, 3)?,
                color,
            );
        }
        "strokeRect" => {
            let color = target.state.stroke.to_premul(target.state.global_alpha);
            target.surface.stroke_rect(
                num_arg(args, 0)?,
                num_arg(args, 1)?,
                num_arg(args, 2)?,
                num_arg(args, 3)?,
                target.state.line_width,
                color,
            );
        }
        "clearRect" => {
            target.surface.clear_rect(
                num_arg(args, 0)?,
                num_arg(args, 1)?,
                num_arg(args, 2)?,
                num_arg(args, 3)?,
            );
        }
        "drawImage" => {
            let image = image_arg(args, 0)?;
            let dx = num_arg(args, 1)?;
            let dy = num_arg(args, 2)?;
            let (dw, dh) = if args.len() >= 5 {
                (num_arg(args, 3)?, num_arg(args, 4)?)
            } else {
                (f64::from(image.width), f64::from(image.height))
            };
            target
                .surface
                .draw_image(image.as_ref(), dx, dy, dw, dh, target.state.global_alpha);
        }
        "putImageData" => {
            let bytes = bytes_arg(args, 0)?;
            let dx = num_arg(args, 1)? as i64;
            let dy = num_arg(args, 2)? as i64;
            let sw = num_arg(args, 3)? as u32;
            let sh = num_arg(args, 4)? as u32;
            target.surface.put_image_data(bytes.as_slice(), dx, dy, sw, sh);
        }
        other => {
            return Err(ReplayError::draw(format!(
                "unsupported draw call \"{other}\""
            )));
        }
    }
    Ok(())
}

fn arg<'a>(args: &'a [ResolvedArg], i: usize) -> ReplayResult<&'a ResolvedArg> {
    args.get(i)
        .ok_or_else(|| ReplayError::draw(format!("missing argument {i}")))
}

fn num_arg(args: &[ResolvedArg], i: usize) -> ReplayResult<f64> {
    match arg(args, i)? {
        ResolvedArg::Value(v) => v
            .as_f64()
            .ok_or_else(|| ReplayError::draw(format!("argument {i} is not a number"))),
        _ => Err(ReplayError::draw(format!("argument {i} is not a number"))),
    }
}

fn str_arg(args: &[ResolvedArg], i: usize) -> ReplayResult<&str> {
    match arg(args, i)? {
        ResolvedArg::Value(v) => v
            .as_str()
            .ok_or_else(|| ReplayError::draw(format!("argument {i} is not a string"))),
        _ => Err(ReplayError::draw(format!("argument {i} is not a string"))),
    }
}

fn image_arg(
    args: &[ResolvedArg],
    i: usize,
) -> ReplayResult<Arc<crate::decode::image::PreparedImage>> {
    match arg(args, i)? {
        ResolvedArg::Image(img) => Ok(img.clone()),
        _ => Err(ReplayError::draw(format!(
            "argument {i} is not a decoded image"
        ))),
    }
}

fn bytes_arg(args: &[ResolvedArg], i: usize) -> ReplayResult<Arc<Vec<u8>>> {
    match arg(args, i)? {
        ResolvedArg::Bytes(b) => Ok(b.clone()),
        _ => Err(ReplayError::draw(format!(
            "argument {i} is not a byte payload"
        ))),
    }
}
