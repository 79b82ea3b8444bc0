//! End-to-end pipeline runs against the in-process sample image server and
//! stub encoder/prober/player executables.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio_util::sync::CancellationToken;

use slidekiosk::encode::Encoder;
use slidekiosk::fetch::RemoteImageSource;
use slidekiosk::mock_images;
use slidekiosk::pipeline::Pipeline;
use slidekiosk::playback::{Player, PlayerKind};
use slidekiosk::probe::Prober;
use slidekiosk::retry::RetryPolicy;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    {
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh").unwrap();
        writeln!(f, "{body}").unwrap();
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

struct Fixture {
    _samples: tempfile::TempDir,
    _storage: tempfile::TempDir,
    videos: tempfile::TempDir,
    _stubs: tempfile::TempDir,
    pipeline: Pipeline,
}

/// Five sample images, a playlist of exactly five items, 3 s per image, and
/// stub binaries: the encoder captures its spec file and creates the
/// artifact, the prober reports 15 s, the player exits quickly.
fn fixture(music_dir: Option<PathBuf>) -> Fixture {
    let samples = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    let videos = tempfile::tempdir().unwrap();
    let stubs = tempfile::tempdir().unwrap();

    for i in 0..5 {
        std::fs::write(samples.path().join(format!("sample-{i}.png")), b"png").unwrap();
    }

    let encoder_stub = write_script(
        stubs.path(),
        "encoder",
        // -n name -f spec -o outdir -s resolution ...
        "printf '%s ' \"$@\" > \"$6/captured-args.txt\"\n\
         cp \"$4\" \"$6/captured-spec.txt\"\n\
         : > \"$6/$2.mp4\"\n\
         echo \"encoded $2\"",
    );
    let prober_stub = write_script(
        stubs.path(),
        "prober",
        "echo 'Duration: 00:00:15.000000, start: 0.000000, bitrate: 800 kb/s' >&2",
    );
    let player_stub = write_script(stubs.path(), "player", "echo \"playing $@\"; sleep 0.1");

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let sample_dir = samples.path().to_path_buf();

    let prober = Prober::new().with_bin(prober_stub.to_string_lossy().to_string());
    let encoder = Encoder::new(videos.path(), "640x480")
        .with_bin(encoder_stub.to_string_lossy().to_string())
        .with_prober(prober.clone());
    let player = Player::new(PlayerKind::Mpv)
        .with_bin(player_stub.to_string_lossy().to_string())
        .with_tick(Duration::from_millis(50));

    let source = RemoteImageSource::new(format!("http://{addr}/playlist"))
        .unwrap()
        .with_policy(RetryPolicy::capped(3));

    let pipeline = Pipeline::new(
        Arc::new(source),
        storage.path(),
        music_dir,
        3,
        2,
        encoder,
        prober,
        player,
    );

    // Serve the sample images once a runtime exists.
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();
        let _ = mock_images::serve(listener, sample_dir, 5, 5).await;
    });

    Fixture {
        _samples: samples,
        _storage: storage,
        videos,
        _stubs: stubs,
        pipeline,
    }
}

// ─── The whole cycle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn immediate_cycle_runs_every_stage() {
    let fx = fixture(None);
    let started = Instant::now();

    let report = fx
        .pipeline
        .run(None, &CancellationToken::new())
        .await
        .unwrap();

    // No deadline means no spin-wait before the player starts.
    assert!(started.elapsed() < Duration::from_secs(10));

    assert_eq!(report.image_count, 5);
    assert_eq!(report.encode.estimated_duration_secs, 15);
    assert!((report.actual_duration_secs - 15.0).abs() < 1e-9);
    assert!((report.window.actual_duration_secs - 15.0).abs() < 1e-9);
    assert!(report.window.deadline.is_none());
    assert!(report.encode.artifact_path.exists());
    assert_eq!(report.encode.artifact_path.extension().unwrap(), "mp4");
}

#[tokio::test]
async fn the_spec_reaching_the_encoder_is_well_formed() {
    let fx = fixture(None);
    fx.pipeline
        .run(None, &CancellationToken::new())
        .await
        .unwrap();

    let spec = std::fs::read_to_string(fx.videos.path().join("captured-spec.txt")).unwrap();
    let lines: Vec<&str> = spec.lines().collect();

    let image_lines = lines.iter().filter(|l| l.contains(".png")).count();
    assert_eq!(image_lines, 5, "five image entries in {spec:?}");
    // Five transitions follow the five images; the fade pair choice can add
    // extra lines on top of the ten-line baseline.
    assert!(lines.len() >= 10);
    assert_eq!(*lines.last().unwrap(), "fadeout:2");
    assert!(spec.ends_with('\n'));

    for line in &lines {
        assert!(!line.starts_with(':'), "leading colon in {line:?}");
        assert!(!line.ends_with(':'), "trailing colon in {line:?}");
    }
    for line in lines.iter().filter(|l| l.contains(".png")) {
        assert!(line.ends_with(":3"), "per-image duration in {line:?}");
    }
}

#[tokio::test]
async fn encoder_receives_the_full_command_line() {
    let music = tempfile::tempdir().unwrap();
    std::fs::write(music.path().join("loop.mp3"), b"mp3").unwrap();

    let fx = fixture(Some(music.path().to_path_buf()));
    fx.pipeline
        .run(None, &CancellationToken::new())
        .await
        .unwrap();

    let args = std::fs::read_to_string(fx.videos.path().join("captured-args.txt")).unwrap();
    assert!(args.contains("-n "));
    assert!(args.contains("-f "));
    assert!(args.contains("-o "));
    assert!(args.contains("-s 640x480"));
    assert!(args.contains("-mp4"));
    // 15 s of video over a 15 s track: exactly one audio argument.
    assert!(args.contains("-a "));
    assert!(args.contains("loop.mp3"));
}

// ─── Deadline handling ───────────────────────────────────────────────────────

#[tokio::test]
async fn overlong_show_is_truncated_to_the_deadline() {
    let fx = fixture(None);
    let started = Instant::now();

    // 15 s of probed video against a deadline one second out.
    let deadline = Local::now() + chrono::Duration::seconds(1);
    let report = fx
        .pipeline
        .run(Some(deadline), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.window.actual_duration_secs <= 1.05);
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "playback was bounded by the deadline window"
    );
}
