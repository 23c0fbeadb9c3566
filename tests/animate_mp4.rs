use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use morphogram::{
    AlphaMask, AnimationJob, Animator, Fps, Frame, MorphogramResult, OutputFormat, TextRaster,
};

struct BlockRaster;

impl TextRaster for BlockRaster {
    fn raster(&self, text: &str, size_px: f32) -> MorphogramResult<AlphaMask> {
        let width = ((text.chars().count() as f32) * size_px * 0.5).ceil().max(1.0) as u32;
        let height = size_px.ceil().max(1.0) as u32;
        AlphaMask::new(width, height, vec![255; (width * height) as usize])
    }
}

fn ffmpeg_tools_available() -> bool {
    let probe = |bin: &str| {
        Command::new(bin)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    };
    probe("ffmpeg") && probe("ffprobe")
}

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "morphogram_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn solid_frames(count: usize, width: u32, height: u32) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            let fill = (i * 60) as u8;
            Frame::from_rgba8(width, height, vec![fill; (width * height * 4) as usize]).unwrap()
        })
        .collect()
}

fn probe_duration_secs(path: &std::path::Path) -> f64 {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .expect("ffprobe runs");
    String::from_utf8_lossy(&out.stdout).trim().parse().unwrap()
}

#[test]
fn three_frames_at_ten_fps_make_a_short_mp4() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not on PATH");
        return;
    }

    let out_dir = temp_dir("mp4_e2e");
    let mut job = AnimationJob::new(
        "workout",
        OutputFormat::Mp4 {
            fps: Fps::new(10, 1).unwrap(),
        },
    );
    job.out_dir = Some(out_dir.clone());

    let animator = Animator::new(Arc::new(BlockRaster));
    let out_path = animator.create(&solid_frames(3, 800, 600), &job).unwrap();

    assert_eq!(out_path, out_dir.join("workout.mp4"));
    assert!(out_path.exists());
    assert!(std::fs::metadata(&out_path).unwrap().len() > 0);

    // 3 frames at 10 fps; allow container overhead slack.
    let duration = probe_duration_secs(&out_path);
    assert!(
        (duration - 0.3).abs() < 0.2,
        "expected ~0.3s, got {duration}"
    );

    std::fs::remove_dir_all(&out_dir).ok();
}

#[test]
fn failed_mp4_job_leaves_no_partial_file() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }

    let out_dir = temp_dir("mp4_abort");
    let mut job = AnimationJob::new(
        "tiny",
        OutputFormat::Mp4 {
            fps: Fps::new(10, 1).unwrap(),
        },
    );
    job.out_dir = Some(out_dir.clone());

    // A 1x1 first frame rounds to a zero-sized canvas, which the job rejects
    // after scratch setup; nothing may be left on disk.
    let animator = Animator::new(Arc::new(BlockRaster));
    let result = animator.create(&solid_frames(1, 1, 1), &job);
    assert!(result.is_err());
    assert!(!out_dir.join("tiny.mp4").exists());

    std::fs::remove_dir_all(&out_dir).ok();
}
