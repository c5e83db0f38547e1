//! End-to-end render tests with scripted FFmpeg.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use common::{is_nvenc, is_x264, FixedProbe, Outcome, ScriptedExecutor};
use spliceo_media::{
    build_timeline, classify_timeline, AssembleOptions, Assembler, ClassifyOptions, DomainPath,
    HardwareProfile, MediaError, PlanContext, RenderOptions, RenderOrchestrator, Timeline,
};
use spliceo_models::{
    Edit, EditKind, EncodingConfig, QualityPreset, Resolution, Subtitle, ZoomFactor,
};

const SOURCE: &str = "/in/source.mp4";
const HD: Resolution = Resolution::new(1280, 720);
const FHD: Resolution = Resolution::new(1920, 1080);

fn timeline(edits: &[Edit], subs: &[Subtitle], duration: f64, src: Resolution, out: Resolution) -> Timeline {
    let mut t = build_timeline(edits, subs, duration).unwrap();
    classify_timeline(&mut t, &ClassifyOptions::new(src, out));
    t
}

fn orchestrator(exec: Arc<ScriptedExecutor>, hw: HardwareProfile, dir: &TempDir) -> RenderOrchestrator {
    RenderOrchestrator::new(
        exec,
        hw,
        EncodingConfig::from_preset(QualityPreset::Balanced),
        dir.path().join("work"),
    )
}

#[tokio::test]
async fn test_unedited_video_is_copied_and_moved() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::succeeding());
    let t = timeline(&[], &[], 30.0, HD, HD);
    assert!(t.segments()[0].can_copy);

    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();
    assert_eq!(report.copied(), 1);
    assert_eq!(exec.calls().len(), 1);
    assert_eq!(exec.calls()[0].arg_value("-c"), Some("copy"));

    let probe = Arc::new(FixedProbe::new(30.0));
    let output = dir.path().join("out").join("final.mp4");
    let assembled = Assembler::new(exec.clone(), probe)
        .assemble(&report.rendered, &output, &dir.path().join("work"))
        .await
        .unwrap();

    assert!(output.exists());
    assert!(!report.rendered[0].path.exists());
    assert!(assembled.warning.is_none());
    // Single segment: no concat invocation.
    assert_eq!(exec.calls().len(), 1);
}

#[tokio::test]
async fn test_cut_renders_two_copies_and_concats_in_order() {
    let dir = TempDir::new().unwrap();
    // Later segments finish first.
    let exec = Arc::new(ScriptedExecutor::succeeding().with_delay(|spec| {
        if spec.label.starts_with("segment 0") {
            Duration::from_millis(40)
        } else {
            Duration::from_millis(1)
        }
    }));
    let cut = Edit::new("c", EditKind::Cut, 10.0, 15.0);
    let t = timeline(&[cut], &[], 30.0, HD, HD);
    assert_eq!(t.len(), 2);

    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();
    let indices: Vec<usize> = report.rendered.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(exec.segment_calls(1)[0].arg_value("-ss"), Some("15.000"));

    let probe = Arc::new(FixedProbe::new(25.1));
    let output = dir.path().join("final.mp4");
    let mut reversed = report.rendered.clone();
    reversed.reverse();
    let assembled = Assembler::new(exec.clone(), probe)
        .assemble(&reversed, &output, &dir.path().join("work"))
        .await
        .unwrap();

    let lists = exec.concat_lists();
    assert_eq!(lists.len(), 1);
    let lines: Vec<&str> = lists[0].lines().collect();
    assert!(lines[0].ends_with("segment_0000.mp4'"));
    assert!(lines[1].ends_with("segment_0001.mp4'"));

    let concat = exec.calls().into_iter().last().unwrap();
    assert_eq!(concat.arg_value("-safe"), Some("0"));
    assert_eq!(concat.arg_value("-movflags"), Some("+faststart"));
    assert!((assembled.expected_duration - 25.0).abs() < 1e-9);
    assert!(assembled.warning.is_none());
    assert!(!dir.path().join("work").join("concat_list.txt").exists());
}

#[tokio::test]
async fn test_zoom_with_subtitle_goes_hybrid() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::succeeding());
    let zoom = Edit::new("z", EditKind::Zoom, 5.0, 8.0).with_zoom(ZoomFactor::Factor(1.5));
    let sub = Subtitle::new("s", "Hello", 6.0, 7.0);
    let t = timeline(&[zoom], &[sub], 20.0, HD, HD);

    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();

    let domains: Vec<DomainPath> = report.rendered.iter().map(|s| s.domain).collect();
    assert_eq!(domains, vec![DomainPath::Copy, DomainPath::Hybrid, DomainPath::Copy]);

    let hybrid = &exec.segment_calls(1)[0];
    let vf = hybrid.arg_value("-vf").unwrap();
    assert!(vf.starts_with("crop="));
    assert!(vf.contains("drawtext=text='Hello'"));
    assert!(vf.contains("enable='between(t,1.000,2.000)'"));
    assert!(vf.ends_with("hwupload_cuda"));
    assert!(!vf.contains("hwdownload"));
    assert!(is_nvenc(hybrid));
}

#[tokio::test]
async fn test_hardware_failure_retries_on_cpu() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(|spec| {
        if spec.label.starts_with("segment 2 ") && is_nvenc(spec) {
            Outcome::Fail(1, "OpenEncodeSessionEx failed: out of memory".into())
        } else {
            Outcome::Ok
        }
    }));
    let edits = [
        Edit::new("a", EditKind::Speed, 0.0, 4.0).with_speed(2.0),
        Edit::new("b", EditKind::Speed, 4.0, 8.0).with_speed(0.5),
        Edit::new("c", EditKind::Zoom, 8.0, 12.0).with_zoom(ZoomFactor::Factor(2.0)),
    ];
    let t = timeline(&edits, &[], 12.0, HD, HD);
    assert_eq!(t.len(), 3);

    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.hardware_fallbacks(), 1);
    let seg2 = exec.segment_calls(2);
    assert_eq!(seg2.len(), 2);
    assert!(is_nvenc(&seg2[0]));
    assert!(is_x264(&seg2[1]));
    assert!(!seg2[1].has_arg("-hwaccel"));
    assert!(!seg2[1].arg_value("-vf").unwrap().contains("hwupload"));
    assert_eq!(report.rendered[2].domain, DomainPath::CpuOnly);
    assert!(report.rendered[2].hw_fallback);
}

#[tokio::test]
async fn test_timeout_is_terminal_and_partial_success_reported() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(|spec| {
        if spec.label.starts_with("segment 1 ") {
            Outcome::Timeout("frame=  120 fps= 3.1 speed=0.05x".into())
        } else {
            Outcome::Ok
        }
    }));
    let edits = [
        Edit::new("a", EditKind::Speed, 0.0, 5.0).with_speed(1.5),
        Edit::new("b", EditKind::Speed, 5.0, 10.0).with_speed(1.5),
    ];
    let t = timeline(&edits, &[], 10.0, HD, HD);

    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();

    assert_eq!(report.failed_indices(), vec![1]);
    assert!(report.failures[0].timed_out);
    assert_eq!(
        report.failures[0].stderr_tail.as_deref(),
        Some("frame=  120 fps= 3.1 speed=0.05x")
    );
    assert_eq!(exec.segment_calls(1).len(), 1, "timeouts are not retried");
    assert_eq!(report.rendered.len(), 1);
    assert_eq!(exec.segment_calls(1)[0].timeout, Some(Duration::from_secs(150)));
}

#[tokio::test]
async fn test_cpu_failure_after_fallback_fails_segment() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(|spec| {
        if spec.label.starts_with("segment 0 ") {
            Outcome::Fail(1, "Invalid data found when processing input".into())
        } else {
            Outcome::Ok
        }
    }));
    let t = timeline(&[], &[], 10.0, FHD, HD);

    let result = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(FHD, HD))
        .await;

    match assert_err!(result) {
        MediaError::NoSegmentsRendered { failed } => assert_eq!(failed, 1),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(exec.segment_calls(0).len(), 2);
}

#[tokio::test]
async fn test_resolution_change_encodes_everything_on_device() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::succeeding());
    let cut = Edit::new("c", EditKind::Cut, 4.0, 6.0);
    let t = timeline(&[cut], &[], 12.0, FHD, HD);
    assert!(t.segments().iter().all(|s| s.needs_processing && !s.can_copy));

    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(FHD, HD))
        .await
        .unwrap();

    assert_eq!(report.copied(), 0);
    for call in exec.calls() {
        assert_eq!(call.arg_value("-hwaccel_output_format"), Some("cuda"));
        assert_eq!(call.arg_value("-vf"), Some("scale_cuda=1280:720,setsar=1"));
    }
}

#[tokio::test]
async fn test_cpu_only_profile_never_touches_nvenc() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::succeeding());
    let speed = Edit::new("s", EditKind::Speed, 0.0, 3.0).with_speed(3.0);
    let t = timeline(&[speed], &[], 6.0, HD, HD);

    let report = orchestrator(exec.clone(), HardwareProfile::cpu_only("no driver"), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();

    assert_eq!(report.hardware_fallbacks(), 0);
    let encoded = exec.segment_calls(0);
    assert!(is_x264(&encoded[0]));
    assert_eq!(encoded[0].arg_value("-af"), Some("atempo=2,atempo=1.5"));
}

#[tokio::test]
async fn test_worker_limit_bounds_concurrency() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(
        ScriptedExecutor::succeeding().with_delay(|_| Duration::from_millis(20)),
    );
    let edits: Vec<Edit> = (0..8)
        .map(|i| Edit::new(format!("e{i}"), EditKind::Speed, i as f64, i as f64 + 1.0).with_speed(2.0))
        .collect();
    let t = timeline(&edits, &[], 8.0, HD, HD);
    assert_eq!(t.len(), 8);

    let options = RenderOptions {
        max_workers: 2,
        ..RenderOptions::default()
    };
    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .with_options(options)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();

    assert_eq!(report.rendered.len(), 8);
    assert!(exec.peak_concurrency() <= 2);
    assert!(exec.peak_concurrency() >= 1);
}

#[tokio::test]
async fn test_assembler_duration_mismatch() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::succeeding());
    let cut = Edit::new("c", EditKind::Cut, 5.0, 6.0);
    let t = timeline(&[cut], &[], 10.0, HD, HD);
    let work = dir.path().join("work");

    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();

    // Lenient: warning only.
    let lenient = Assembler::new(exec.clone(), Arc::new(FixedProbe::new(7.0)));
    let out = dir.path().join("lenient.mp4");
    let assembled = assert_ok!(lenient.assemble(&report.rendered, &out, &work).await);
    assert!(assembled.warning.is_some());

    // Strict: error.
    let strict = Assembler::new(exec.clone(), Arc::new(FixedProbe::new(7.0))).with_options(
        AssembleOptions {
            strict: true,
            ..AssembleOptions::default()
        },
    );
    let out = dir.path().join("strict.mp4");
    match assert_err!(strict.assemble(&report.rendered, &out, &work).await) {
        MediaError::DurationMismatch { expected, actual } => {
            assert!((expected - 9.0).abs() < 1e-9);
            assert!((actual - 7.0).abs() < 1e-9);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_concat_failure_keeps_diagnostics() {
    let dir = TempDir::new().unwrap();
    let exec = Arc::new(ScriptedExecutor::new(|spec| {
        if spec.label == "concat" {
            Outcome::Fail(1, "Non-monotonous DTS in output stream".into())
        } else {
            Outcome::Ok
        }
    }));
    let cut = Edit::new("c", EditKind::Cut, 2.0, 3.0);
    let t = timeline(&[cut], &[], 6.0, HD, HD);
    let report = orchestrator(exec.clone(), HardwareProfile::gpu_available(), &dir)
        .render_all(t.segments(), Path::new(SOURCE), &PlanContext::new(HD, HD))
        .await
        .unwrap();

    let err = Assembler::new(exec, Arc::new(FixedProbe::new(5.0)))
        .assemble(&report.rendered, &dir.path().join("o.mp4"), &dir.path().join("work"))
        .await
        .unwrap_err();
    assert_eq!(err.stderr_tail(), Some("Non-monotonous DTS in output stream"));
}
