//! Transform behaviour against scripted stand-ins for ffmpeg and ffprobe.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use duocast_common::{DuocastError, MediaTools};
use duocast_media_engine::runner::DIAGNOSTIC_TAIL_BYTES;
use duocast_media_engine::{
    BrandingAssets, ClipProcessor, CompositeInputs, Compositor, EncoderId, EncoderProbe,
    FfmpegRunner, FilterGraphSpec, TransformProgress, TrimRequest,
};

const PROBE_JSON: &str = r#"{"format": {"duration": "7.500000", "size": "4096"}, "streams": [{"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720, "r_frame_rate": "30/1"}, {"codec_type": "audio", "codec_name": "aac"}]}"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// ffprobe that always describes a 7.5 s 720p clip.
fn fake_ffprobe(dir: &Path) -> PathBuf {
    write_script(dir, "ffprobe", &format!("cat <<'JSON'\n{PROBE_JSON}\nJSON"))
}

/// ffmpeg that reports progress, copies any concat manifest aside and
/// touches its last argument (the output).
fn succeeding_ffmpeg(dir: &Path) -> PathBuf {
    let body = format!(
        r#"prev=""
for arg; do
  if [ "$prev" = "-i" ] && [ "${{arg%.txt}}" != "$arg" ]; then cp "$arg" "{seen}"; fi
  prev="$arg"
done
echo "out_time_us=2500000"
echo "progress=continue"
echo "out_time_us=7500000"
echo "progress=end"
echo "encoder chatter" >&2
for last; do :; done
printf 'not really video but large enough' > "$last""#,
        seen = dir.join("manifest_seen.txt").display()
    );
    write_script(dir, "ffmpeg", &body)
}

fn failing_ffmpeg(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg",
        r#"i=0
while [ $i -lt 300 ]; do echo "frame error line $i" >&2; i=$((i+1)); done
echo "Conversion failed!" >&2
exit 1"#,
    )
}

fn processor(ffmpeg: PathBuf, ffprobe: PathBuf) -> ClipProcessor {
    ClipProcessor::new(
        MediaTools { ffmpeg, ffprobe },
        Arc::new(EncoderProbe::fixed(EncoderId::Libx264)),
    )
}

fn collect_progress() -> (Arc<Mutex<Vec<TransformProgress>>>, Box<dyn Fn(TransformProgress) + Send>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, Box::new(move |p| sink.lock().unwrap().push(p)))
}

#[test]
fn progress_is_reported_per_block() {
    let dir = tempfile::tempdir().unwrap();
    let runner = FfmpegRunner::new(MediaTools {
        ffmpeg: succeeding_ffmpeg(dir.path()),
        ffprobe: fake_ffprobe(dir.path()),
    });
    let out = dir.path().join("out.mp4");
    let (seen, cb) = collect_progress();

    runner
        .run(&[out.to_string_lossy().into_owned()], 10.0, Some(cb))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!((seen[0].fraction - 0.25).abs() < 1e-9);
    assert!(!seen[0].complete);
    assert_eq!(seen[1].fraction, 1.0);
    assert!(seen[1].complete);
}

#[test]
fn failure_carries_bounded_tail() {
    let dir = tempfile::tempdir().unwrap();
    let runner = FfmpegRunner::new(MediaTools {
        ffmpeg: failing_ffmpeg(dir.path()),
        ffprobe: fake_ffprobe(dir.path()),
    });

    let err = runner.run(&[], 0.0, None).unwrap_err();
    match err {
        DuocastError::Transform { message } => {
            assert!(message.len() <= DIAGNOSTIC_TAIL_BYTES);
            assert!(message.ends_with("Conversion failed!"));
            assert!(!message.contains("line 0\n"));
        }
        other => panic!("expected transform error, got {other:?}"),
    }
}

#[test]
fn trim_returns_probed_asset() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    std::fs::write(&source, vec![0u8; 2048]).unwrap();
    let processor = processor(succeeding_ffmpeg(dir.path()), fake_ffprobe(dir.path()));

    let request = TrimRequest::new(&source, dir.path().join("cuts/clip.mp4"), 2.0, 9.5);
    let (seen, cb) = collect_progress();
    let asset = processor.trim(&request, Some(cb)).unwrap();

    assert_eq!(asset.path, dir.path().join("cuts/clip.mp4"));
    assert!((asset.metadata.duration_secs - 7.5).abs() < 1e-9);
    assert_eq!(asset.metadata.audio_streams, 1);
    assert_eq!(seen.lock().unwrap().last().map(|p| p.fraction), Some(1.0));
}

#[test]
fn concat_manifest_is_removed_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let intro = dir.path().join("intro.mp4");
    let main = dir.path().join("it's main.mp4");
    std::fs::write(&intro, b"a").unwrap();
    std::fs::write(&main, b"b").unwrap();
    let out_dir = dir.path().join("out");
    let processor = processor(succeeding_ffmpeg(dir.path()), fake_ffprobe(dir.path()));

    let asset = processor
        .concat(&[intro.clone(), main.clone()], &out_dir.join("joined.mp4"), None)
        .unwrap();
    assert!(asset.path.ends_with("joined.mp4"));

    let manifest = std::fs::read_to_string(dir.path().join("manifest_seen.txt")).unwrap();
    let lines: Vec<_> = manifest.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("intro.mp4'"));
    assert!(lines[1].contains("it'\\''s main.mp4"));

    let leftovers: Vec<_> = std::fs::read_dir(&out_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|n| n.to_string_lossy().ends_with(".txt"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn concat_manifest_is_removed_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    std::fs::write(&clip, b"a").unwrap();
    let out_dir = dir.path().join("out");
    let processor = processor(failing_ffmpeg(dir.path()), fake_ffprobe(dir.path()));

    let err = processor
        .concat(&[clip], &out_dir.join("joined.mp4"), None)
        .unwrap_err();
    assert!(matches!(err, DuocastError::Transform { .. }));
    assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
}

#[test]
fn thumbnails_replace_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.mp4");
    std::fs::write(&source, b"video").unwrap();
    let thumbs_dir = dir.path().join("thumbs");
    std::fs::create_dir_all(&thumbs_dir).unwrap();
    for i in 1..=5 {
        std::fs::write(thumbs_dir.join(format!("thumb_{i:04}.jpg")), b"old").unwrap();
    }

    // Writes three numbered frames the way the image2 muxer would.
    let ffmpeg = write_script(
        dir.path(),
        "ffmpeg",
        r#"for last; do :; done
dir=$(dirname "$last")
for i in 0001 0002 0003; do printf jpg > "$dir/thumb_$i.jpg"; done
echo "out_time_us=7500000"
echo "progress=end""#,
    );
    let processor = processor(ffmpeg, fake_ffprobe(dir.path()));

    let (seen, cb) = collect_progress();
    let thumbs = processor
        .thumbnails(&source, &thumbs_dir, 10, 320, Some(cb))
        .unwrap();
    assert_eq!(seen.lock().unwrap().last().map(|p| p.fraction), Some(1.0));
    let names: Vec<_> = thumbs
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["thumb_0001.jpg", "thumb_0002.jpg", "thumb_0003.jpg"]);
    assert!(!thumbs_dir.join("thumb_0004.jpg").exists());
}

#[test]
fn heavy_diagnostics_do_not_stall_without_callback() {
    let dir = tempfile::tempdir().unwrap();
    // Far beyond any pipe buffer on both streams.
    let ffmpeg = write_script(
        dir.path(),
        "ffmpeg",
        r#"yes "frame=  120 fps= 30 q=23.0 size=1024kB time=00:00:04.00" | head -c 4194304 >&2
yes "out_time_us=1000000" | head -c 4194304
echo "done" >&2"#,
    );
    let runner = FfmpegRunner::new(MediaTools {
        ffmpeg,
        ffprobe: fake_ffprobe(dir.path()),
    });

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(runner.run(&[], 0.0, None));
    });
    let result = rx
        .recv_timeout(std::time::Duration::from_secs(30))
        .expect("ffmpeg run stalled on a full pipe");
    assert!(result.is_ok(), "{result:?}");
}

fn compositor(ffmpeg: PathBuf, ffprobe: PathBuf) -> Compositor {
    Compositor::new(
        MediaTools { ffmpeg, ffprobe },
        Arc::new(EncoderProbe::fixed(EncoderId::Libx264)),
        BrandingAssets::default(),
    )
}

fn composite_inputs(dir: &Path) -> CompositeInputs {
    let screen = dir.join("screen_raw.mkv");
    let webcam = dir.join("webcam_raw.mkv");
    std::fs::write(&screen, vec![0u8; 2048]).unwrap();
    std::fs::write(&webcam, vec![0u8; 2048]).unwrap();
    CompositeInputs {
        screen,
        webcam,
        output: dir.join("out/composite.mp4"),
    }
}

#[test]
fn composite_produces_probed_asset() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = composite_inputs(dir.path());
    let compositor = compositor(succeeding_ffmpeg(dir.path()), fake_ffprobe(dir.path()));

    let (seen, cb) = collect_progress();
    let asset = compositor
        .composite(&inputs, &FilterGraphSpec::default(), Some(cb))
        .unwrap();

    assert_eq!(asset.path, inputs.output);
    assert_eq!(asset.metadata.audio_streams, 1);
    assert_eq!(seen.lock().unwrap().last().map(|p| p.fraction), Some(1.0));
}

#[test]
fn composite_missing_input_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut inputs = composite_inputs(dir.path());
    inputs.webcam = dir.path().join("never_recorded.mkv");
    let compositor = compositor(succeeding_ffmpeg(dir.path()), fake_ffprobe(dir.path()));

    let err = compositor
        .composite(&inputs, &FilterGraphSpec::default(), None)
        .unwrap_err();
    match err {
        DuocastError::FileNotFound { path } => assert_eq!(path, inputs.webcam),
        other => panic!("expected FileNotFound, got {other:?}"),
    }
    assert!(!inputs.output.exists());
}

#[test]
fn composite_failure_keeps_only_the_tail() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = composite_inputs(dir.path());
    let compositor = compositor(failing_ffmpeg(dir.path()), fake_ffprobe(dir.path()));

    let err = compositor
        .composite(&inputs, &FilterGraphSpec::default(), None)
        .unwrap_err();
    match err {
        DuocastError::Transform { message } => {
            assert!(message.len() <= DIAGNOSTIC_TAIL_BYTES);
            assert!(message.ends_with("Conversion failed!"));
        }
        other => panic!("expected transform error, got {other:?}"),
    }
}

#[test]
fn composite_rejects_webcam_without_audio() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = composite_inputs(dir.path());
    let ffprobe = write_script(
        dir.path(),
        "ffprobe",
        r#"cat <<'JSON'
{"format": {"duration": "5.000000", "size": "2048"}, "streams": [{"codec_type": "video", "codec_name": "h264", "width": 640, "height": 480, "r_frame_rate": "30/1"}]}
JSON"#,
    );
    let marker = dir.path().join("ffmpeg_ran");
    let ffmpeg = write_script(
        dir.path(),
        "ffmpeg",
        &format!("touch \"{}\"", marker.display()),
    );
    let compositor = compositor(ffmpeg, ffprobe);

    let err = compositor
        .composite(&inputs, &FilterGraphSpec::default(), None)
        .unwrap_err();
    match err {
        DuocastError::CaptureValidation { message } => {
            assert!(message.contains("no audio stream"), "{message}");
        }
        other => panic!("expected CaptureValidation, got {other:?}"),
    }
    assert!(!marker.exists());
}
