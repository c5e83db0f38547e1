//! Subtitle burn-in and the debug index label.

use std::collections::HashSet;

use spliceo_models::{Resolution, Segment, Subtitle, TextAlign};

use crate::filters::{FilterOp, TextOverlay};

/// `drawtext` for one subtitle on a segment starting at `segment_start` and
/// played back at `speed`.
///
/// Timing is relative to the segment and in output seconds, since the text
/// is drawn after `setpts` retimes the frames. The start is clamped at zero.
pub fn subtitle_op(subtitle: &Subtitle, segment_start: f64, speed: f64, frame: Resolution) -> FilterOp {
    let style = &subtitle.style;
    let (w, h) = (frame.width as f64, frame.height as f64);
    let x_pct = style.position.x.clamp(0.0, 100.0);
    let y_pct = style.position.y.clamp(0.0, 100.0);

    let x = match style.text_align {
        TextAlign::Center => "(w-tw)/2".to_string(),
        TextAlign::Right => format!("w-tw-{}", ((100.0 - x_pct) / 100.0 * w) as i64),
        TextAlign::Left => format!("{}", (x_pct / 100.0 * w) as i64),
    };
    let y = format!("{}", (y_pct / 100.0 * h) as i64);

    let speed = if speed > 0.0 { speed } else { 1.0 };
    let start = ((subtitle.start - segment_start) / speed).max(0.0);
    let end = ((subtitle.end - segment_start) / speed).max(start);

    FilterOp::DrawText(TextOverlay {
        text: subtitle.text.clone(),
        x,
        y,
        font_size: style.font_size,
        font_color: format!("0x{}", style.fill_hex()),
        border_width: style.stroke_width,
        border_color: Some(format!("0x{}", style.stroke_hex())),
        box_color: None,
        enable: Some((start, end)),
    })
}

/// Burn-in ops for every subtitle on the segment, in order. A caption with the
/// same text and timing as an earlier one is drawn once.
pub fn subtitle_ops(segment: &Segment, frame: Resolution) -> Vec<FilterOp> {
    let mut seen = HashSet::new();
    segment
        .subtitles
        .iter()
        .filter(|s| seen.insert((s.text.clone(), s.start.to_bits(), s.end.to_bits())))
        .map(|s| subtitle_op(s, segment.start, segment.speed_factor(), frame))
        .collect()
}

/// Yellow `[index]` label in the top-left corner.
pub fn debug_overlay_op(index: usize) -> FilterOp {
    FilterOp::DrawText(TextOverlay {
        text: format!("[{index}]"),
        x: "10".to_string(),
        y: "10".to_string(),
        font_size: 20.0,
        font_color: "yellow".to_string(),
        border_width: 0.0,
        border_color: None,
        box_color: Some("black@0.7".to_string()),
        enable: None,
    })
}
