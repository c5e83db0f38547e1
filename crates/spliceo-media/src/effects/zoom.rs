//! Anchor-centred zoom as crop + rescale.

use spliceo_models::{Edit, Resolution};

use crate::filters::FilterOp;

/// Crop window for a zoom edit on a `frame`-sized picture.
///
/// Returns `None` for identity and sub-unity zooms. The window keeps the
/// frame's aspect, is centred on the anchor, and is clamped inside the frame.
pub fn crop_window(edit: &Edit, frame: Resolution) -> Option<(u32, u32, u32, u32)> {
    let zoom = edit.zoom.value()?;
    if !zoom.is_finite() || zoom <= 1.0 {
        return None;
    }

    let (w, h) = (frame.width as f64, frame.height as f64);
    // Even dimensions keep 4:2:0 chroma aligned.
    let crop_w = ((w / zoom) as u32 & !1).max(2);
    let crop_h = ((h / zoom) as u32 & !1).max(2);

    let x = (edit.anchor_x * w - crop_w as f64 / 2.0).round();
    let y = (edit.anchor_y * h - crop_h as f64 / 2.0).round();
    let x = x.clamp(0.0, (frame.width.saturating_sub(crop_w)) as f64) as u32;
    let y = y.clamp(0.0, (frame.height.saturating_sub(crop_h)) as f64) as u32;

    Some((crop_w, crop_h, x, y))
}

/// Crop and rescale back to `frame`. Empty when the edit has no active zoom.
pub fn ops(edit: &Edit, frame: Resolution) -> Vec<FilterOp> {
    match crop_window(edit, frame) {
        Some((width, height, x, y)) => vec![
            FilterOp::Crop {
                width,
                height,
                x,
                y,
            },
            FilterOp::Scale {
                width: frame.width,
                height: frame.height,
            },
        ],
        None => Vec::new(),
    }
}
