//! Off-screen raster surface and replayed 2D drawing state.
//!
//! Drawing is deliberately simple: axis-aligned pixel fills with source-over
//! blending and nearest-neighbor image sampling, no anti-aliasing. Replay
//! fidelity comes from applying the recorded calls in order, not from
//! sub-pixel accuracy.

use kurbo::Rect;

use crate::decode::image::PreparedImage;
use crate::foundation::pixel::{FrameRgba, PremulRgba8, over};
use crate::surface::color::StyleColor;

/// An off-screen premultiplied-RGBA8 surface accumulating replayed draw state.
#[derive(Clone, Debug)]
pub(crate) struct CanvasSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl CanvasSurface {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    /// Match the source element's current dimensions.
    ///
    /// A real canvas clears on resize; accumulated state is kept only when the
    /// dimensions are unchanged.
    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.data = vec![0; (width as usize) * (height as usize) * 4];
    }

    pub(crate) fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: PremulRgba8) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                let i = self.index(px, py);
                let dst = [
                    self.data[i],
                    self.data[i + 1],
                    self.data[i + 2],
                    self.data[i + 3],
                ];
                self.data[i..i + 4].copy_from_slice(&over(dst, color, 1.0));
            }
        }
    }

    /// Reset a rectangle to transparent black, as `clearRect` does.
    pub(crate) fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            let row = self.index(x0, py);
            self.data[row..row + ((x1 - x0) as usize) * 4].fill(0);
        }
    }

    /// Stroke a rectangle outline centered on its edges.
    pub(crate) fn stroke_rect(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        line_width: f64,
        color: PremulRgba8,
    ) {
        let lw = line_width.max(0.0);
        if lw == 0.0 {
            return;
        }
        let half = lw / 2.0;
        // Top, bottom, left, right bands.
        self.fill_rect(x - half, y - half, w + lw, lw, color);
        self.fill_rect(x - half, y + h - half, w + lw, lw, color);
        self.fill_rect(x - half, y + half, lw, (h - lw).max(0.0), color);
        self.fill_rect(x + w - half, y + half, lw, (h - lw).max(0.0), color);
    }

    /// Blit an image into the destination rectangle with nearest-neighbor
    /// sampling and source-over blending.
    pub(crate) fn draw_image(
        &mut self,
        image: &PreparedImage,
        dx: f64,
        dy: f64,
        dw: f64,
        dh: f64,
        opacity: f64,
    ) {
        if image.width == 0 || image.height == 0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip(dx, dy, dw, dh) else {
            return;
        };
        let src = image.rgba8_premul.as_slice();
        for py in y0..y1 {
            let v = ((f64::from(py) + 0.5 - dy) / dh).clamp(0.0, 1.0);
            let sy = ((v * f64::from(image.height)) as u32).min(image.height - 1);
            for px in x0..x1 {
                let u = ((f64::from(px) + 0.5 - dx) / dw).clamp(0.0, 1.0);
                let sx = ((u * f64::from(image.width)) as u32).min(image.width - 1);
                let si = ((sy as usize) * (image.width as usize) + (sx as usize)) * 4;
                let sp = [src[si], src[si + 1], src[si + 2], src[si + 3]];
                let di = self.index(px, py);
                let dst = [
                    self.data[di],
                    self.data[di + 1],
                    self.data[di + 2],
                    self.data[di + 3],
                ];
                self.data[di..di + 4].copy_from_slice(&over(dst, sp, opacity));
            }
        }
    }

    /// Replace a rectangle with straight-RGBA bytes, as `putImageData` does
    /// (no blending, alpha included).
    pub(crate) fn put_image_data(&mut self, rgba: &[u8], dx: i64, dy: i64, sw: u32, sh: u32) {
        if rgba.len() < (sw as usize) * (sh as usize) * 4 {
            return;
        }
        for sy in 0..sh {
            let py = dy + i64::from(sy);
            if py < 0 || py >= i64::from(self.height) {
                continue;
            }
            for sx in 0..sw {
                let px = dx + i64::from(sx);
                if px < 0 || px >= i64::from(self.width) {
                    continue;
                }
                let si = ((sy as usize) * (sw as usize) + (sx as usize)) * 4;
                let a = u16::from(rgba[si + 3]);
                let premul = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
                let di = self.index(px as u32, py as u32);
                self.data[di] = premul(rgba[si]);
                self.data[di + 1] = premul(rgba[si + 1]);
                self.data[di + 2] = premul(rgba[si + 2]);
                self.data[di + 3] = a as u8;
            }
        }
    }

    /// Copy of the current pixel contents.
    pub(crate) fn snapshot(&self) -> FrameRgba {
        FrameRgba {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 4
    }

    /// Normalize (negative extents allowed) and clip to surface bounds.
    fn clip(&self, x: f64, y: f64, w: f64, h: f64) -> Option<(u32, u32, u32, u32)> {
        let rect = Rect::new(x, y, x + w, y + h).abs();
        let bounds = Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height));
        let rect = rect.intersect(bounds);
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return None;
        }
        let x0 = rect.x0.floor() as u32;
        let y0 = rect.y0.floor() as u32;
        let x1 = (rect.x1.ceil() as u32).min(self.width);
        let y1 = (rect.y1.ceil() as u32).min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

/// Mutable 2D-context state replayed by property-set and save/restore calls.
#[derive(Clone, Debug)]
pub(crate) struct DrawState {
    pub(crate) fill: StyleColor,
    pub(crate) stroke: StyleColor,
    pub(crate) global_alpha: f64,
    pub(crate) line_width: f64,
    stack: Vec<SavedState>,
}

#[derive(Clone, Debug)]
struct SavedState {
    fill: StyleColor,
    stroke: StyleColor,
    global_alpha: f64,
    line_width: f64,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            fill: StyleColor::BLACK,
            stroke: StyleColor::BLACK,
            global_alpha: 1.0,
            line_width: 1.0,
            stack: Vec::new(),
        }
    }
}

impl DrawState {
    pub(crate) fn save(&mut self) {
        self.stack.push(SavedState {
            fill: self.fill,
            stroke: self.stroke,
            global_alpha: self.global_alpha,
            line_width: self.line_width,
        });
    }

    /// Restore the previous saved state; no-op on an empty stack, matching
    /// 2D-context semantics.
    pub(crate) fn restore(&mut self) {
        if let Some(saved) = self.stack.pop() {
            self.fill = saved.fill;
            self.stroke = saved.stroke;
            self.global_alpha = saved.global_alpha;
            self.line_width = saved.line_width;
        }
    }
}
