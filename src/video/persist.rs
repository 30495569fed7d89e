//! Writing generated videos to disk.
//!
//! Files are written to a hidden temporary file in the target directory,
//! synced, and renamed into place. A destination path never holds a
//! truncated file.

use crate::error::{GenVideoError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

/// Extension of generated files.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Attempts at finding a free file name before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

/// Random per-process seed for filename suffixes.
static SUFFIX_SEED: LazyLock<u32> = LazyLock::new(|| {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
});

static SUFFIX_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Returns the next 8-hex-digit suffix.
///
/// Multiplying the counter by an odd constant is a bijection on `u32`, so
/// suffixes never repeat within a process until the counter wraps.
fn next_suffix() -> String {
    let n = SUFFIX_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:08x}", *SUFFIX_SEED ^ n.wrapping_mul(0x9E37_79B1))
}

/// Generates `video_<YYYYMMDD>_<HHMMSS>_<8hex>.mp4` from local time.
pub fn generate_filename() -> String {
    let now = chrono::Local::now();
    format!(
        "video_{}_{}.{VIDEO_EXTENSION}",
        now.format("%Y%m%d_%H%M%S"),
        next_suffix()
    )
}

/// A fully assembled video waiting to be written.
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    data: Vec<u8>,
    filename: String,
    dir: PathBuf,
}

impl VideoArtifact {
    /// Creates an artifact with a freshly generated file name.
    pub fn new(data: Vec<u8>, dir: impl Into<PathBuf>) -> Self {
        Self {
            data,
            filename: generate_filename(),
            dir: dir.into(),
        }
    }

    /// Suggested file name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Video bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Writes the artifact and returns the final path.
    ///
    /// If the suggested name is taken a new one is generated; existing
    /// files are never replaced.
    pub fn persist(self) -> Result<PathBuf> {
        self.persist_with(open_temp)
    }

    fn persist_with<W, F>(self, mut open: F) -> Result<PathBuf>
    where
        W: SyncWrite,
        F: FnMut(&Path) -> io::Result<W>,
    {
        fs::create_dir_all(&self.dir).map_err(|source| GenVideoError::Save {
            path: self.dir.clone(),
            source,
        })?;

        let mut filename = self.filename;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(&filename);
            match write_new_with(&path, &self.data, &mut open) {
                Ok(()) => {
                    tracing::info!(
                        path = %path.display(),
                        bytes = self.data.len(),
                        "video saved"
                    );
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(path = %path.display(), "file exists, picking another name");
                    filename = generate_filename();
                }
                Err(source) => return Err(GenVideoError::Save { path, source }),
            }
        }

        Err(GenVideoError::Save {
            path: self.dir.join(filename),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "could not find an unused file name",
            ),
        })
    }
}

/// Saves `data` under `output_dir` with a generated name.
pub fn save(data: Vec<u8>, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
    VideoArtifact::new(data, output_dir.as_ref()).persist()
}

/// Sink for the temporary file's bytes.
trait SyncWrite: Write {
    /// Flushes written bytes to stable storage.
    fn sync(&mut self) -> io::Result<()>;
}

impl SyncWrite for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

fn open_temp(temp: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(temp)
}

#[cfg(test)]
fn write_new(path: &Path, data: &[u8]) -> io::Result<()> {
    write_new_with(path, data, open_temp)
}

/// Writes `data` to a temporary sibling of `path` opened by `open`, then
/// links it into place. Fails with `AlreadyExists` if `path` is taken.
fn write_new_with<W, F>(path: &Path, data: &[u8], open: F) -> io::Result<()>
where
    W: SyncWrite,
    F: FnOnce(&Path) -> io::Result<W>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let temp = dir.join(format!(".tmp.{}", uuid::Uuid::new_v4().simple()));

    // The writer is dropped before linking.
    let result = open(&temp)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync()
        })
        .and_then(|()| link_into_place(&temp, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// Moves `temp` to `path` without replacing an existing file.
fn link_into_place(temp: &Path, path: &Path) -> io::Result<()> {
    match fs::hard_link(temp, path) {
        Ok(()) => {
            // The video is in place; a stale temp link is only clutter.
            if let Err(e) = fs::remove_file(temp) {
                tracing::debug!(path = %temp.display(), "failed to remove temp file: {e}");
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        // Filesystems without hard links: check, then rename.
        Err(_) => {
            if path.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "destination exists",
                ));
            }
            fs::rename(temp, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_filename_format() {
        let name = generate_filename();
        // video_YYYYMMDD_HHMMSS_xxxxxxxx.mp4
        assert_eq!(name.len(), "video_20250101_120000_0123abcd.mp4".len());
        assert!(name.starts_with("video_"));
        assert!(name.ends_with(".mp4"));

        let stem = name.trim_start_matches("video_").trim_end_matches(".mp4");
        let parts: Vec<&str> = stem.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[1].len(), 6);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_filenames_are_unique() {
        let names: HashSet<String> = (0..10_000).map(|_| generate_filename()).collect();
        assert_eq!(names.len(), 10_000);
    }

    #[test]
    fn test_save_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("output");
        let data = vec![7u8; 4096];

        let path = save(data.clone(), &out).unwrap();
        assert_eq!(path.parent().unwrap(), out);
        assert_eq!(fs::read(&path).unwrap(), data);

        let entries: Vec<_> = fs::read_dir(&out).unwrap().collect();
        assert_eq!(entries.len(), 1, "temporary file left behind");
    }

    #[test]
    fn test_persist_never_replaces() {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = VideoArtifact::new(b"new".to_vec(), tmp.path());
        let taken = tmp.path().join(artifact.filename());
        fs::write(&taken, b"old").unwrap();

        let path = artifact.persist().unwrap();
        assert_ne!(path, taken);
        assert_eq!(fs::read(&taken).unwrap(), b"old");
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_save_failure_leaves_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let err = save(vec![1, 2, 3], blocker.join("output")).unwrap_err();
        assert!(matches!(err, GenVideoError::Save { .. }));
        assert_eq!(err.exit_code(), 4);

        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    /// Writes through to a file until `budget` bytes are spent.
    struct FailingWriter {
        file: File,
        budget: usize,
        fail_sync: bool,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.file.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl SyncWrite for FailingWriter {
        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::other("sync failed"));
            }
            self.file.sync_all()
        }
    }

    fn failing_persist(
        budget: usize,
        fail_sync: bool,
    ) -> (tempfile::TempDir, PathBuf, Result<PathBuf>) {
        let tmp = tempfile::tempdir().unwrap();
        let artifact = VideoArtifact::new(vec![9u8; 64 * 1024], tmp.path());
        let target = tmp.path().join(artifact.filename());
        let result = artifact.persist_with(|temp| {
            Ok(FailingWriter {
                file: open_temp(temp)?,
                budget,
                fail_sync,
            })
        });
        (tmp, target, result)
    }

    #[test]
    fn test_failure_mid_write_leaves_nothing() {
        let (tmp, target, result) = failing_persist(1000, false);
        let err = result.unwrap_err();
        assert!(matches!(err, GenVideoError::Save { .. }));
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("disk full"));
        assert!(!target.exists());
        assert_eq!(
            fs::read_dir(tmp.path()).unwrap().count(),
            0,
            "temporary file left behind"
        );
    }

    #[test]
    fn test_failure_at_sync_leaves_nothing() {
        let (tmp, target, result) = failing_persist(usize::MAX, true);
        assert!(matches!(result, Err(GenVideoError::Save { .. })));
        assert!(!target.exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_new_rejects_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("video.mp4");
        fs::write(&path, b"keep").unwrap();

        let err = write_new(&path, b"other").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"keep");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
