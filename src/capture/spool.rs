//! Frame spool
//!
//! An external camera process drops still frames into a directory. Once
//! started, the spool watches that directory and capture returns the most
//! recent frame.

use crate::capture::{CaptureError, EncodedFrame, FrameSource};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Directory-backed frame source
pub struct FrameSpool {
    dir: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
    latest: Arc<Mutex<Option<PathBuf>>>,
}

impl FrameSpool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            watcher: Mutex::new(None),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_started(&self) -> bool {
        lock(&self.watcher).is_some()
    }

    /// Path of the frame the next capture would read
    pub fn latest_frame(&self) -> Option<PathBuf> {
        lock(&self.latest).clone()
    }

    fn read_latest(&self) -> Result<EncodedFrame, CaptureError> {
        let path = self
            .latest_frame()
            .ok_or_else(|| CaptureError::Unavailable("no frame received yet".to_string()))?;

        match fs::read(&path) {
            Ok(bytes) => Ok(EncodedFrame::from_bytes(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // camera rotated the file away, fall back to whatever is newest now
                debug!("Frame {} vanished, rescanning spool", path.display());
                let newest = newest_frame(&self.dir)?
                    .ok_or_else(|| CaptureError::Unavailable("no frame received yet".to_string()))?;
                *lock(&self.latest) = Some(newest.clone());
                Ok(EncodedFrame::from_bytes(fs::read(&newest)?))
            }
            Err(e) => Err(CaptureError::FrameRead(e)),
        }
    }
}

impl FrameSource for FrameSpool {
    fn start(&self) -> Result<(), CaptureError> {
        let mut watcher_slot = lock(&self.watcher);
        if watcher_slot.is_some() {
            return Ok(());
        }
        if !self.dir.is_dir() {
            return Err(CaptureError::Unavailable(format!(
                "frame directory {} does not exist",
                self.dir.display()
            )));
        }

        *lock(&self.latest) = newest_frame(&self.dir)?;

        let latest = Arc::clone(&self.latest);
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        if let Some(path) = event.paths.into_iter().rev().find(|p| is_frame(p)) {
                            *lock(&latest) = Some(path);
                        }
                    }
                }
                Err(e) => warn!("Frame watcher error: {}", e),
            },
            Config::default().with_poll_interval(Duration::from_millis(500)),
        )
        .map_err(|e| CaptureError::Watcher(e.to_string()))?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|e| CaptureError::Watcher(e.to_string()))?;

        *watcher_slot = Some(watcher);
        info!("Frame spool started on {}", self.dir.display());
        Ok(())
    }

    fn capture_image(&self) -> Result<EncodedFrame, CaptureError> {
        if !self.is_started() {
            return Err(CaptureError::Unavailable("start capture first".to_string()));
        }
        self.read_latest()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Most recently modified frame in `dir`
fn newest_frame(dir: &Path) -> Result<Option<PathBuf>, CaptureError> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_frame(&path) {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        let is_newer = newest
            .as_ref()
            .map(|(best, best_path)| modified > *best || (modified == *best && path > *best_path))
            .unwrap_or(true);
        if is_newer {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
