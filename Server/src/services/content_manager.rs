use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use circular_buffer::CircularBuffer;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::error::{Result, StreamError};
use crate::types::TrackKind;

/// Media segments kept on disk per track. Fewer than this and a client joining
/// mid-stream cannot find enough trailing segments to start playback.
pub const RETENTION_WINDOW: usize = 10;

/// Appended to a file name while its content is being written.
pub const TEMP_SUFFIX: &str = ".temp";

/// A numbered media segment reserved for one rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSlot {
    pub kind: TrackKind,
    pub index: u64,
    pub temp_path: PathBuf,
    pub final_path: PathBuf,
}

#[derive(Debug)]
struct TrackFiles {
    next_index: u64,
    published: CircularBuffer<RETENTION_WINDOW, PathBuf>,
}

impl Default for TrackFiles {
    fn default() -> Self {
        Self {
            next_index: 0,
            published: CircularBuffer::new(),
        }
    }
}

/// Owns the output directory: segment numbering, temp-then-rename publication
/// and the retention window.
///
/// Every file becomes visible under its final name only through a rename, so
/// the HTTP file server never serves a partially written segment.
#[derive(Debug)]
pub struct ContentManager {
    output_dir: PathBuf,
    video: Mutex<TrackFiles>,
    audio: Mutex<TrackFiles>,
}

impl ContentManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            video: Mutex::new(TrackFiles::default()),
            audio: Mutex::new(TrackFiles::default()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn track(&self, kind: TrackKind) -> MutexGuard<'_, TrackFiles> {
        let files = match kind {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
        };
        files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delete everything a previous session left in the output directory and
    /// restart numbering at 0. Returns the number of files removed.
    #[instrument(skip_all)]
    pub async fn reset_all(&self) -> Result<usize> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StreamError::io(&self.output_dir, e))?;

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.output_dir)
            .await
            .map_err(|e| StreamError::io(&self.output_dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StreamError::io(&self.output_dir, e))?
        {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            fs::remove_file(&path)
                .await
                .map_err(|e| StreamError::io(&path, e))?;
            removed += 1;
        }

        for kind in TrackKind::ALL {
            *self.track(kind) = TrackFiles::default();
        }

        debug!("Removed {} files from {:?}", removed, self.output_dir);
        Ok(removed)
    }

    /// Reserve the next segment number for `kind`. Numbers are never reused
    /// within a session.
    pub fn allocate_next_segment(&self, kind: TrackKind) -> SegmentSlot {
        let index = {
            let mut files = self.track(kind);
            let index = files.next_index;
            files.next_index += 1;
            index
        };

        let final_path = self.output_dir.join(kind.segment_name(index));
        SegmentSlot {
            kind,
            index,
            temp_path: temp_path_for(&final_path),
            final_path,
        }
    }

    /// Make a fully written temp file visible under its final name.
    #[instrument(skip_all, fields(segment = %slot.final_path.display()))]
    pub async fn publish(&self, slot: &SegmentSlot) -> Result<()> {
        rename_with_retry(&slot.temp_path, &slot.final_path).await
    }

    /// Record a published segment and delete the oldest one once more than
    /// `RETENTION_WINDOW` exist. Deletion failures are logged only.
    pub async fn retain(&self, slot: &SegmentSlot) -> Option<PathBuf> {
        let evicted = {
            let mut files = self.track(slot.kind);
            let evicted = if files.published.is_full() {
                files.published.pop_front()
            } else {
                None
            };
            files.published.push_back(slot.final_path.clone());
            evicted
        };

        if let Some(old) = &evicted {
            match fs::remove_file(old).await {
                Ok(()) => debug!("Removed expired segment {:?}", old),
                Err(e) => warn!("Failed to remove expired segment {:?}: {}", old, e),
            }
        }
        evicted
    }

    /// Segments currently inside the retention window, oldest first.
    pub fn published(&self, kind: TrackKind) -> Vec<PathBuf> {
        self.track(kind).published.iter().cloned().collect()
    }

    /// Write an init segment or the manifest through the same temp-then-rename path.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn write_static_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let final_path = self.output_dir.join(name);
        let temp_path = temp_path_for(&final_path);

        write_with_retry(&temp_path, contents).await?;
        rename_with_retry(&temp_path, &final_path).await?;
        Ok(final_path)
    }
}

pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

// I/O on the publish path is retried once before it becomes fatal.
async fn rename_with_retry(from: &Path, to: &Path) -> Result<()> {
    if let Err(e) = fs::rename(from, to).await {
        warn!("Rename {:?} -> {:?} failed, retrying: {}", from, to, e);
        fs::rename(from, to)
            .await
            .map_err(|e| StreamError::io(to, e))?;
    }
    Ok(())
}

pub(crate) async fn write_with_retry(path: &Path, contents: &[u8]) -> Result<()> {
    if let Err(e) = fs::write(path, contents).await {
        warn!("Write to {:?} failed, retrying: {}", path, e);
        fs::write(path, contents)
            .await
            .map_err(|e| StreamError::io(path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn publish_segment(manager: &ContentManager, kind: TrackKind, contents: &[u8]) -> SegmentSlot {
        let slot = manager.allocate_next_segment(kind);
        fs::write(&slot.temp_path, contents).await.unwrap();
        manager.publish(&slot).await.unwrap();
        manager.retain(&slot).await;
        slot
    }

    #[tokio::test]
    async fn indices_are_monotonic_per_track() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ContentManager::new(dir.path());

        let names: Vec<_> = [TrackKind::Video, TrackKind::Video, TrackKind::Audio, TrackKind::Video]
            .into_iter()
            .map(|kind| manager.allocate_next_segment(kind))
            .map(|slot| slot.final_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["video0.webm", "video1.webm", "audio0.webm", "video2.webm"]);

        let slot = manager.allocate_next_segment(TrackKind::Audio);
        assert_eq!(slot.temp_path, dir.path().join("audio1.webm.temp"));
    }

    #[tokio::test]
    async fn file_appears_only_after_publish() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ContentManager::new(dir.path());
        let slot = manager.allocate_next_segment(TrackKind::Video);

        fs::write(&slot.temp_path, vec![7u8; 4096]).await.unwrap();
        assert!(!slot.final_path.exists());

        manager.publish(&slot).await.unwrap();
        assert!(!slot.temp_path.exists());
        assert_eq!(fs::metadata(&slot.final_path).await.unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn publish_without_temp_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ContentManager::new(dir.path());
        let slot = manager.allocate_next_segment(TrackKind::Audio);

        let error = manager.publish(&slot).await.unwrap_err();
        assert!(matches!(error, StreamError::Io { .. }));
    }

    #[tokio::test]
    async fn retention_keeps_newest_window() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ContentManager::new(dir.path());

        for _ in 0..(RETENTION_WINDOW + 3) {
            publish_segment(&manager, TrackKind::Video, b"segment").await;
        }
        publish_segment(&manager, TrackKind::Audio, b"segment").await;

        for index in 0..3 {
            assert!(!dir.path().join(TrackKind::Video.segment_name(index)).exists());
        }
        for index in 3..(RETENTION_WINDOW as u64 + 3) {
            assert!(dir.path().join(TrackKind::Video.segment_name(index)).exists());
        }

        let published = manager.published(TrackKind::Video);
        assert_eq!(published.len(), RETENTION_WINDOW);
        assert_eq!(published[0], dir.path().join("video3.webm"));
        assert_eq!(manager.published(TrackKind::Audio).len(), 1);
    }

    #[tokio::test]
    async fn retention_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ContentManager::new(dir.path());

        let first = publish_segment(&manager, TrackKind::Audio, b"a").await;
        fs::remove_file(&first.final_path).await.unwrap();
        for _ in 0..RETENTION_WINDOW - 1 {
            publish_segment(&manager, TrackKind::Audio, b"a").await;
        }

        let slot = manager.allocate_next_segment(TrackKind::Audio);
        fs::write(&slot.temp_path, b"a").await.unwrap();
        manager.publish(&slot).await.unwrap();
        assert_eq!(manager.retain(&slot).await, Some(first.final_path));
    }

    #[tokio::test]
    async fn reset_clears_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video41.webm"), b"stale").unwrap();
        std::fs::write(dir.path().join("manifest.mpd"), b"stale").unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();

        let manager = ContentManager::new(dir.path());
        publish_segment(&manager, TrackKind::Video, b"x").await;

        let removed = manager.reset_all().await.unwrap();
        assert_eq!(removed, 3);
        assert!(dir.path().join("keep").is_dir());
        assert!(manager.published(TrackKind::Video).is_empty());
        assert_eq!(manager.allocate_next_segment(TrackKind::Video).index, 0);
    }

    #[tokio::test]
    async fn static_files_are_written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ContentManager::new(dir.path().join("nested"));
        manager.reset_all().await.unwrap();

        let path = manager.write_static_file("manifest.mpd", b"<MPD/>").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<MPD/>");
        assert!(!temp_path_for(&path).exists());
    }
}
