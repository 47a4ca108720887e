//! Integration tests for the frame stream driver.

mod common;

use std::sync::Arc;

use common::*;
use image::{DynamicImage, Rgb, RgbImage};
use plategate::stream::{supervise, ConsoleExit, StopReason};
use plategate::{FrameSource, FrameSourceError, ImageSequence, StreamDriver};
use tokio_util::sync::CancellationToken;

fn fixed_pipeline(text: &str) -> Arc<RecognitionPipeline> {
    Arc::new(RecognitionPipeline::new(
        Box::new(FixedDetector(vec![Region::new(0, 0, 20, 10, 0.9)])),
        Box::new(FixedExtractor::new(text)),
    ))
}

fn frames(count: usize) -> Vec<Frame> {
    (0..count).map(|_| blank_frame(64, 32)).collect()
}

#[test]
fn test_every_frame_reaches_the_sink() {
    let mut driver = StreamDriver::new(VecSource::new(frames(3)), fixed_pipeline("A123BC77"));
    let mut seen = Vec::new();
    let mut sink = |frame_no: u64, plate: Option<&str>| seen.push((frame_no, plate.map(str::to_string)));

    let stats = driver.run(&mut sink, &CancellationToken::new()).unwrap();

    assert_eq!(stats.stop, StopReason::EndOfStream);
    assert_eq!(stats.frames, 3);
    assert_eq!(stats.plates, 3);
    assert_eq!(stats.illegible, 0);
    assert_eq!(
        seen,
        vec![
            (1, Some("A123BC77".to_string())),
            (2, Some("A123BC77".to_string())),
            (3, Some("A123BC77".to_string())),
        ]
    );
}

#[test]
fn test_illegible_and_missing_plates_are_counted() {
    let pipeline = Arc::new(RecognitionPipeline::new(
        Box::new(FixedDetector(vec![Region::new(0, 0, 20, 10, 0.9)])),
        Box::new(FixedExtractor::new("")),
    ));
    let mut driver = StreamDriver::new(VecSource::new(frames(2)), pipeline);
    let mut sink = |_frame_no: u64, _plate: Option<&str>| {};
    let stats = driver.run(&mut sink, &CancellationToken::new()).unwrap();
    assert_eq!((stats.frames, stats.plates, stats.illegible), (2, 0, 2));

    let mut driver = StreamDriver::new(
        VecSource::new(frames(2)),
        Arc::new(RecognitionPipeline::new(
            Box::new(FixedDetector(Vec::new())),
            Box::new(FixedExtractor::new("A123BC77")),
        )),
    );
    let stats = driver.run(&mut sink, &CancellationToken::new()).unwrap();
    assert_eq!((stats.frames, stats.plates, stats.illegible), (2, 0, 0));
}

#[test]
fn test_cancel_before_run_processes_nothing() {
    let mut driver = StreamDriver::new(VecSource::new(frames(3)), fixed_pipeline("A123BC77"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut calls = 0;
    let mut sink = |_frame_no: u64, _plate: Option<&str>| calls += 1;
    let stats = driver.run(&mut sink, &cancel).unwrap();

    assert_eq!(stats.stop, StopReason::Cancelled);
    assert_eq!(stats.frames, 0);
    assert_eq!(calls, 0);
}

#[test]
fn test_cancel_takes_effect_before_next_frame() {
    let mut driver = StreamDriver::new(VecSource::new(frames(5)), fixed_pipeline("A123BC77"));
    let cancel = CancellationToken::new();

    let sink_cancel = cancel.clone();
    let mut sink = move |_frame_no: u64, _plate: Option<&str>| sink_cancel.cancel();
    let stats = driver.run(&mut sink, &cancel).unwrap();

    assert_eq!(stats.stop, StopReason::Cancelled);
    assert_eq!(stats.frames, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_driver_runs_on_blocking_thread() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let driver_cancel = cancel.clone();
    let driver = tokio::task::spawn_blocking(move || {
        let mut driver = StreamDriver::new(VecSource::new(frames(4)), fixed_pipeline("K100KK10"));
        let mut sink = move |_frame_no: u64, plate: Option<&str>| {
            if let Some(plate) = plate {
                let _ = tx.send(plate.to_string());
            }
        };
        driver.run(&mut sink, &driver_cancel)
    });

    let mut received = Vec::new();
    while let Some(plate) = rx.recv().await {
        received.push(plate);
    }
    let stats = driver.await??;

    assert_eq!(received.len(), 4);
    assert_eq!(stats.stop, StopReason::EndOfStream);
    Ok(())
}

#[test]
fn test_image_sequence_reads_directory_in_order() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    for (name, width) in [("b.png", 20u32), ("a.png", 10), ("c.jpg", 30)] {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 8, Rgb([10, 20, 30])))
            .save(dir.path().join(name))?;
    }
    std::fs::write(dir.path().join("notes.txt"), "not a frame")?;
    std::fs::create_dir(dir.path().join("nested.png"))?;

    let mut source = ImageSequence::from_dir(dir.path())?;
    assert_eq!(source.remaining(), 3);

    let mut widths = Vec::new();
    while let Some(frame) = source.next_frame()? {
        widths.push(frame.width());
    }
    assert_eq!(widths, vec![10, 20, 30]);
    Ok(())
}

#[test]
fn test_corrupt_frame_is_a_decode_error() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("frame.png"), b"definitely not a png")?;

    let mut driver = StreamDriver::new(ImageSequence::from_dir(dir.path())?, fixed_pipeline("A"));
    let mut sink = |_frame_no: u64, _plate: Option<&str>| {};
    let result = driver.run(&mut sink, &CancellationToken::new());

    assert!(
        matches!(result, Err(FrameSourceError::Decode { .. })),
        "expected a decode error, got {:?}",
        result
    );
    Ok(())
}

#[test]
fn test_missing_directory_is_an_io_error() {
    let dir = tempfile::TempDir::new().unwrap();

    let result = ImageSequence::from_dir(dir.path().join("missing"));
    assert!(matches!(result, Err(FrameSourceError::Io { .. })));
}

/// Endless stream of identical frames.
struct RepeatSource;

impl FrameSource for RepeatSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        Ok(Some(blank_frame(32, 16)))
    }
}

fn spawn_driver<S: FrameSource + 'static>(
    source: S,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<Result<plategate::StreamStats, FrameSourceError>> {
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || {
        let mut driver = StreamDriver::new(source, fixed_pipeline("A123BC77"));
        let mut sink = |_frame_no: u64, _plate: Option<&str>| {};
        driver.run(&mut sink, &cancel)
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_closed_console_lets_stream_finish() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let driver = spawn_driver(VecSource::new(frames(3)), &cancel);

    let stats = supervise(
        driver,
        async { ConsoleExit::Closed },
        std::future::pending::<()>(),
        &cancel,
    )
    .await?;

    assert_eq!(stats.stop, StopReason::EndOfStream);
    assert_eq!(stats.frames, 3);
    assert!(!cancel.is_cancelled());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_quit_cancels_endless_stream() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let driver = spawn_driver(RepeatSource, &cancel);

    let stats = supervise(
        driver,
        async { ConsoleExit::Quit },
        std::future::pending::<()>(),
        &cancel,
    )
    .await?;

    assert_eq!(stats.stop, StopReason::Cancelled);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_signal_cancels_stream() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let driver = spawn_driver(RepeatSource, &cancel);

    let stats = supervise(
        driver,
        std::future::pending::<ConsoleExit>(),
        async {},
        &cancel,
    )
    .await?;

    assert_eq!(stats.stop, StopReason::Cancelled);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_driver_error_ends_supervision_without_console() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("frame.png"), b"definitely not a png")?;
    let cancel = CancellationToken::new();
    let driver = spawn_driver(ImageSequence::from_dir(dir.path())?, &cancel);

    let result = supervise(
        driver,
        std::future::pending::<ConsoleExit>(),
        std::future::pending::<()>(),
        &cancel,
    )
    .await;

    let err = result.expect_err("a corrupt frame should stop supervision");
    assert!(matches!(
        err.downcast_ref::<FrameSourceError>(),
        Some(FrameSourceError::Decode { .. })
    ));
    Ok(())
}
