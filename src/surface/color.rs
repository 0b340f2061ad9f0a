//! Fill/stroke style parsing for replayed 2D state.
//!
//! Recorded pages set styles as CSS color strings; the subset seen in practice
//! is hex, `rgb()`/`rgba()` functional notation, and a handful of keywords.

use crate::foundation::error::{ReplayError, ReplayResult};
use crate::foundation::pixel::PremulRgba8;

/// Straight (non-premultiplied) color with normalized `0..=1` channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct StyleColor {
    pub(crate) r: f64,
    pub(crate) g: f64,
    pub(crate) b: f64,
    pub(crate) a: f64,
}

impl StyleColor {
    pub(crate) const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);

    pub(crate) const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiply into RGBA8, folding in an extra alpha factor
    /// (`globalAlpha`).
    pub(crate) fn to_premul(self, extra_alpha: f64) -> PremulRgba8 {
        fn to_u8(x: f64) -> u8 {
            (x.clamp(0.0, 1.0) * 255.0).round() as u8
        }

        let a = (self.a * extra_alpha).clamp(0.0, 1.0);
        [
            to_u8(self.r.clamp(0.0, 1.0) * a),
            to_u8(self.g.clamp(0.0, 1.0) * a),
            to_u8(self.b.clamp(0.0, 1.0) * a),
            to_u8(a),
        ]
    }
}

/// Parse a recorded fill/stroke style string.
pub(crate) fn parse_style(s: &str) -> ReplayResult<StyleColor> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = s.to_ascii_lowercase();
    if lower.starts_with("rgb") {
        return parse_rgb_functional(&lower);
    }
    named(&lower)
        .ok_or_else(|| ReplayError::draw(format!("unsupported style value \"{s}\"")))
}

fn parse_hex(hex: &str) -> ReplayResult<StyleColor> {
    // Length dispatch below is in bytes; non-ASCII input must not reach the
    // slicing or it panics on a char boundary.
    if !hex.is_ascii() {
        return Err(ReplayError::draw(format!("invalid hex color \"#{hex}\"")));
    }
    fn byte(pair: &str) -> ReplayResult<f64> {
        u8::from_str_radix(pair, 16)
            .map(|v| f64::from(v) / 255.0)
            .map_err(|_| ReplayError::draw(format!("invalid hex byte \"{pair}\"")))
    }
    fn nibble(ch: &str) -> ReplayResult<f64> {
        u8::from_str_radix(ch, 16)
            .map(|v| f64::from(v * 17) / 255.0)
            .map_err(|_| ReplayError::draw(format!("invalid hex digit \"{ch}\"")))
    }

    match hex.len() {
        3 => Ok(StyleColor::rgba(
            nibble(&hex[0..1])?,
            nibble(&hex[1..2])?,
            nibble(&hex[2..3])?,
            1.0,
        )),
        6 => Ok(StyleColor::rgba(
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            1.0,
        )),
        8 => Ok(StyleColor::rgba(
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            byte(&hex[6..8])?,
        )),
        _ => Err(ReplayError::draw(
            "hex color must be #RGB, #RRGGBB or #RRGGBBAA",
        )),
    }
}

fn parse_rgb_functional(s: &str) -> ReplayResult<StyleColor> {
    let inner = s
        .strip_prefix("rgba")
        .or_else(|| s.strip_prefix("rgb"))
        .and_then(|rest| rest.trim().strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| ReplayError::draw(format!("malformed rgb() value \"{s}\"")))?;

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(ReplayError::draw("rgb() expects 3 or 4 components"));
    }

    fn channel(p: &str) -> ReplayResult<f64> {
        p.parse::<f64>()
            .map(|v| (v / 255.0).clamp(0.0, 1.0))
            .map_err(|_| ReplayError::draw(format!("invalid rgb channel \"{p}\"")))
    }

    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = if parts.len() == 4 {
        parts[3]
            .parse::<f64>()
            .map(|v| v.clamp(0.0, 1.0))
            .map_err(|_| ReplayError::draw(format!("invalid alpha \"{}\"", parts[3])))?
    } else {
        1.0
    };
    Ok(StyleColor::rgba(r, g, b, a))
}

fn named(s: &str) -> Option<StyleColor> {
    let c = |r: f64, g: f64, b: f64| Some(StyleColor::rgba(r, g, b, 1.0));
    match s {
        "black" => c(0.0, 0.0, 0.0),
        "white" => c(1.0, 1.0, 1.0),
        "red" => c(1.0, 0.0, 0.0),
        "lime" => c(0.0, 1.0, 0.0),
        "green" => c(0.0, 128.0 / 255.0, 0.0),
        "blue" => c(0.0, 0.0, 1.0),
        "yellow" => c(1.0, 1.0, 0.0),
        "cyan" | "aqua" => c(0.0, 1.0, 1.0),
        "magenta" | "fuchsia" => c(1.0, 0.0, 1.0),
        "gray" | "grey" => c(128.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0),
        "transparent" => Some(StyleColor::rgba(0.0, 0.0, 0.0, 0.0)),
        _ => None,
    }
}
