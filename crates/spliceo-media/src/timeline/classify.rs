//! Copy-vs-process classification.

use tracing::debug;

use spliceo_models::{Resolution, Segment};

use super::Timeline;

/// Job-wide inputs to the copy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub source_size: Resolution,
    pub output_size: Resolution,
    pub color_grading: bool,
    pub debug_overlay: bool,
    /// Allow stream copy at all.
    pub smart_copy: bool,
    /// A watermark touches every frame.
    pub watermark: bool,
}

impl ClassifyOptions {
    pub fn new(source_size: Resolution, output_size: Resolution) -> Self {
        Self {
            source_size,
            output_size,
            color_grading: false,
            debug_overlay: false,
            smart_copy: true,
            watermark: false,
        }
    }

    fn pixels_untouched(&self) -> bool {
        self.smart_copy
            && self.source_size == self.output_size
            && !self.color_grading
            && !self.debug_overlay
            && !self.watermark
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub needs_processing: bool,
    pub can_copy: bool,
}

/// Decide whether a segment can be stream-copied.
pub fn classify(segment: &Segment, opts: &ClassifyOptions) -> Classification {
    let forced = segment
        .edit
        .as_ref()
        .is_some_and(|e| e.forces_processing());
    let can_copy = !forced
        && segment.is_original
        && !segment.has_subtitles()
        && opts.pixels_untouched();

    Classification {
        needs_processing: !can_copy,
        can_copy,
    }
}

/// Annotate every segment in place. Returns the number of copyable segments.
pub fn classify_timeline(timeline: &mut Timeline, opts: &ClassifyOptions) -> usize {
    let mut copyable = 0;
    for segment in timeline.segments_mut() {
        let c = classify(segment, opts);
        segment.can_copy = c.can_copy;
        segment.needs_processing = c.needs_processing;
        if c.can_copy {
            copyable += 1;
        }
    }
    debug!(
        copyable,
        processing = timeline.len() - copyable,
        "Segments classified"
    );
    copyable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::build_timeline;
    use spliceo_models::{Edit, EditKind, Subtitle, ZoomFactor};

    const HD: Resolution = Resolution::new(1280, 720);
    const FHD: Resolution = Resolution::new(1920, 1080);

    fn original(start: f64, end: f64) -> Segment {
        Segment::new(0, start, end, None)
    }

    #[test]
    fn test_original_segment_copies() {
        let c = classify(&original(0.0, 30.0), &ClassifyOptions::new(HD, HD));
        assert!(c.can_copy);
        assert!(!c.needs_processing);
    }

    #[test]
    fn test_each_condition_blocks_copy() {
        let seg = original(0.0, 5.0);
        let base = ClassifyOptions::new(HD, HD);

        let cases = [
            ClassifyOptions::new(FHD, HD),
            ClassifyOptions {
                color_grading: true,
                ..base
            },
            ClassifyOptions {
                debug_overlay: true,
                ..base
            },
            ClassifyOptions {
                smart_copy: false,
                ..base
            },
            ClassifyOptions {
                watermark: true,
                ..base
            },
        ];
        for opts in cases {
            let c = classify(&seg, &opts);
            assert!(!c.can_copy, "{opts:?}");
            assert!(c.needs_processing);
        }

        let with_sub = original(0.0, 5.0).with_subtitles(vec![Subtitle::new("s", "x", 1.0, 2.0)]);
        assert!(!classify(&with_sub, &base).can_copy);
    }

    #[test]
    fn test_neutral_edit_is_not_original() {
        let edit = Edit::new("g", EditKind::Generic, 0.0, 5.0);
        let seg = Segment::new(0, 0.0, 5.0, Some(edit));
        let c = classify(&seg, &ClassifyOptions::new(HD, HD));
        assert!(!c.can_copy);
        assert!(c.needs_processing);
    }

    #[test]
    fn test_speed_and_zoom_force_processing() {
        let opts = ClassifyOptions::new(HD, HD);
        let speed = Edit::new("s", EditKind::Speed, 0.0, 5.0).with_speed(1.5);
        let zoom = Edit::new("z", EditKind::Zoom, 0.0, 5.0).with_zoom(ZoomFactor::Factor(1.2));
        for edit in [speed, zoom] {
            let c = classify(&Segment::new(0, 0.0, 5.0, Some(edit)), &opts);
            assert!(c.needs_processing && !c.can_copy);
        }
    }

    #[test]
    fn test_zoom_edit_with_subtitle_scenario() {
        let zoom = Edit::new("z", EditKind::Zoom, 5.0, 8.0).with_zoom(ZoomFactor::Factor(1.5));
        let sub = Subtitle::new("s", "Hello", 6.0, 7.0);
        let mut timeline = build_timeline(&[zoom], &[sub], 20.0).unwrap();
        let copyable = classify_timeline(&mut timeline, &ClassifyOptions::new(HD, HD));

        assert_eq!(copyable, 2);
        let flags: Vec<bool> = timeline.segments().iter().map(|s| s.can_copy).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn test_resolution_change_processes_everything() {
        let mut timeline = build_timeline(&[], &[], 30.0).unwrap();
        let copyable = classify_timeline(&mut timeline, &ClassifyOptions::new(FHD, HD));
        assert_eq!(copyable, 0);
        assert!(timeline.segments().iter().all(|s| s.needs_processing && !s.can_copy));
    }
}
