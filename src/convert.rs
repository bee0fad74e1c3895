//! RGBA byte pixels to and from HSLA.
//!
//! Channels are gamma-encoded sRGB bytes on one side and the HSL cylinder on
//! the other; there is no linear-light step in this pipeline.

use crate::hsla::Hsla;

const EPSILON: f64 = 1e-10;
const ONE_THIRD: f64 = 1.0 / 3.0;
const TWO_THIRDS: f64 = 2.0 / 3.0;
const ONE_SIXTH: f64 = 1.0 / 6.0;

/// Convert an RGBA byte pixel to HSLA.
///
/// Near-equal channels (max − min below 1e−10) are treated as gray: hue is
/// undefined and stored as 0, saturation 0.
pub fn rgba_to_hsla(px: rgb::RGBA<u8>) -> Hsla {
    let r = px.r as f64 / 255.0;
    let g = px.g as f64 / 255.0;
    let b = px.b as f64 / 255.0;
    let a = px.a as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let luminance = (max + min) * 0.5;

    if delta < EPSILON {
        return Hsla::new(0.0, 0.0, luminance, a);
    }

    let saturation = if luminance < 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };

    // Hue sector in [0, 6), then degrees.
    let mut hue = if max == r {
        let mut h = (g - b) / delta;
        if g < b {
            h += 6.0;
        }
        h
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    hue *= 60.0;

    Hsla::new(hue, saturation, luminance, a)
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < ONE_SIXTH {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < TWO_THIRDS {
        p + (q - p) * (TWO_THIRDS - t) * 6.0
    } else {
        p
    }
}

/// Convert an HSLA pixel back to RGBA bytes.
///
/// The input is normalized first, so out-of-range saturation or luminance
/// cannot push a channel outside `[0, 255]`.
pub fn hsla_to_rgba(px: Hsla) -> rgb::RGBA<u8> {
    let px = px.normalized();
    let a = (px.alpha * 255.0).round() as u8;

    if px.saturation < EPSILON {
        let gray = (px.luminance * 255.0).round() as u8;
        return rgb::RGBA {
            r: gray,
            g: gray,
            b: gray,
            a,
        };
    }

    let h = px.hue / 360.0;
    let s = px.saturation;
    let l = px.luminance;

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + ONE_THIRD);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - ONE_THIRD);

    rgb::RGBA {
        r: (r * 255.0).round() as u8,
        g: (g * 255.0).round() as u8,
        b: (b * 255.0).round() as u8,
        a,
    }
}
