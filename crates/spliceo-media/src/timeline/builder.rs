//! Boundary-set segmentation of the source timeline.

use tracing::{debug, warn};

use spliceo_models::{Edit, Segment, Subtitle};

use crate::error::{MediaError, MediaResult};

/// Boundaries closer than this are the same instant (seconds).
pub const EPSILON: f64 = 0.001;

/// Ordered, contiguous, non-overlapping segments of one job's timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    segments: Vec<Segment>,
    total_duration: f64,
    removed_duration: f64,
}

impl Timeline {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub(crate) fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Source duration the timeline was built for.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Seconds spliced out by cuts.
    pub fn removed_duration(&self) -> f64 {
        self.removed_duration
    }

    /// Source seconds that survive the cuts.
    pub fn kept_duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Rendered seconds once speed changes apply.
    pub fn expected_output_duration(&self) -> f64 {
        self.segments.iter().map(Segment::output_duration).sum()
    }
}

/// Partition `[0, total_duration)` at every edit boundary, drop cut ranges,
/// and attach the owning edit and overlapping subtitles to each piece.
///
/// Overlapping non-cut edits resolve to the one that starts first, then the
/// one listed first.
pub fn build_timeline(
    edits: &[Edit],
    subtitles: &[Subtitle],
    total_duration: f64,
) -> MediaResult<Timeline> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "timeline duration must be positive, got {total_duration}"
        )));
    }

    let boundaries = boundary_points(edits, total_duration);
    let (cuts, effects): (Vec<&Edit>, Vec<&Edit>) = edits.iter().partition(|e| e.is_cut());

    let mut segments = Vec::with_capacity(boundaries.len());
    let mut removed_duration = 0.0;

    for pair in boundaries.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        // Every boundary is in the set, so the midpoint decides membership
        // for the whole sub-interval.
        let mid = (a + b) / 2.0;

        if cuts.iter().any(|c| c.contains(mid)) {
            removed_duration += b - a;
            continue;
        }

        let covering: Vec<&Edit> = effects.iter().copied().filter(|e| e.contains(mid)).collect();
        let owner = covering
            .iter()
            .copied()
            .min_by(|x, y| x.start.total_cmp(&y.start));
        if covering.len() > 1 {
            warn!(
                start = a,
                end = b,
                chosen = owner.map(|e| e.id.as_str()).unwrap_or_default(),
                candidates = covering.len(),
                "Overlapping edits, earliest start wins"
            );
        }

        let attached: Vec<Subtitle> = subtitles
            .iter()
            .filter(|s| s.overlaps(a, b))
            .cloned()
            .collect();

        let segment = Segment::new(segments.len(), a, b, owner.cloned()).with_subtitles(attached);
        segments.push(segment);
    }

    debug!(
        segments = segments.len(),
        removed_secs = removed_duration,
        "Timeline built"
    );

    Ok(Timeline {
        segments,
        total_duration,
        removed_duration,
    })
}

/// Sorted boundary instants, merged within [`EPSILON`]. The first point is
/// exactly 0 and the last exactly `total`.
fn boundary_points(edits: &[Edit], total: f64) -> Vec<f64> {
    let mut raw: Vec<f64> = Vec::with_capacity(edits.len() * 2 + 2);
    raw.push(0.0);
    raw.push(total);
    for edit in edits {
        for t in [edit.start, edit.end] {
            if t.is_finite() {
                raw.push(t.clamp(0.0, total));
            }
        }
    }
    raw.sort_by(f64::total_cmp);

    let mut points: Vec<f64> = Vec::with_capacity(raw.len());
    for t in raw {
        match points.last() {
            Some(&last) if t - last <= EPSILON => {}
            _ => points.push(t),
        }
    }
    if let Some(last) = points.last_mut() {
        *last = total;
    }
    points
}
