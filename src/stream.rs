use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::FrameSourceError;
use crate::models::Frame;
use crate::pipeline::RecognitionPipeline;

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Supplies frames until the stream ends (`Ok(None)`).
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;
}

/// Replays image files as a frame stream, in file-name order.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    paths: VecDeque<PathBuf>,
}

impl ImageSequence {
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into(),
        }
    }

    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, FrameSourceError> {
        let dir = dir.as_ref();
        let io_err = |source| FrameSourceError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
            if path.is_file() && is_frame {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(Self::from_paths(paths))
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path).map_err(|source| match source {
            image::ImageError::IoError(source) => FrameSourceError::Io {
                path: path.clone(),
                source,
            },
            source => FrameSourceError::Decode {
                path: path.clone(),
                source,
            },
        })?;
        Ok(Some(Frame::new(image)))
    }
}

/// Receives the recognition result of every processed frame.
pub trait PlateSink: Send {
    fn on_frame(&mut self, frame_no: u64, plate: Option<&str>);
}

impl<F> PlateSink for F
where
    F: FnMut(u64, Option<&str>) + Send,
{
    fn on_frame(&mut self, frame_no: u64, plate: Option<&str>) {
        self(frame_no, plate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    EndOfStream,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub plates: u64,
    pub illegible: u64,
    pub stop: StopReason,
}

/// Pulls frames from a source and runs recognition on each, synchronously.
///
/// Run it on a blocking thread. Cancellation is observed once per cycle, before
/// the next frame is pulled; a frame already being processed is finished first.
pub struct StreamDriver<S: FrameSource> {
    source: S,
    pipeline: Arc<RecognitionPipeline>,
}

impl<S: FrameSource> StreamDriver<S> {
    pub fn new(source: S, pipeline: Arc<RecognitionPipeline>) -> Self {
        Self { source, pipeline }
    }

    pub fn run(
        &mut self,
        sink: &mut dyn PlateSink,
        cancel: &CancellationToken,
    ) -> Result<StreamStats, FrameSourceError> {
        let mut stats = StreamStats::default();
        tracing::info!(detector = self.pipeline.detector_name(), "recognition loop started");

        loop {
            if cancel.is_cancelled() {
                stats.stop = StopReason::Cancelled;
                break;
            }
            let Some(frame) = self.source.next_frame()? else {
                stats.stop = StopReason::EndOfStream;
                break;
            };
            stats.frames += 1;

            let plate = self.pipeline.process(&frame);
            match plate.as_deref() {
                Some("") => stats.illegible += 1,
                Some(_) => stats.plates += 1,
                None => {}
            }
            sink.on_frame(stats.frames, plate.as_deref());
        }

        tracing::info!(
            frames = stats.frames,
            plates = stats.plates,
            illegible = stats.illegible,
            stop = ?stats.stop,
            "recognition loop stopped"
        );
        Ok(stats)
    }
}

/// How the operator console finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// The operator asked to stop.
    Quit,
    /// Input ended (EOF); recognition keeps running.
    Closed,
}

/// Wait for a spawned driver while watching the console and a shutdown signal.
///
/// `Quit` or the shutdown signal cancel the driver; a closed console does not.
/// Returns once the driver has stopped, with its stats or its error.
pub async fn supervise<C, S>(
    mut driver: JoinHandle<Result<StreamStats, FrameSourceError>>,
    console: C,
    shutdown: S,
    cancel: &CancellationToken,
) -> anyhow::Result<StreamStats>
where
    C: Future<Output = ConsoleExit>,
    S: Future<Output = ()>,
{
    tokio::pin!(console);
    tokio::pin!(shutdown);
    let mut console_open = true;
    let mut shutdown_pending = true;

    loop {
        tokio::select! {
            joined = &mut driver => {
                let stats = joined.context("recognition worker failed")??;
                return Ok(stats);
            }
            outcome = &mut console, if console_open => {
                console_open = false;
                match outcome {
                    ConsoleExit::Quit => cancel.cancel(),
                    ConsoleExit::Closed => tracing::info!("console input closed; recognition continues"),
                }
            }
            _ = &mut shutdown, if shutdown_pending => {
                shutdown_pending = false;
                tracing::info!("interrupt received");
                cancel.cancel();
            }
        }
    }
}
