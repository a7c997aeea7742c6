use std::io::{self, Read, Write};
use std::path::Path;

use crate::types::{Chunk, ChunkFile, ChunkManifest};
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes MD5 of `data` and returns the lowercase hex digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}

/// Computes MD5 of an entire file and returns the hex digest.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let file = std::fs::File::open(path)?;
    checksum_reader(file, u64::MAX)
}

/// Computes MD5 of at most the first `window` bytes of a file.
pub fn checksum_leading_window(path: &Path, window: u64) -> Result<String, TransferError> {
    let file = std::fs::File::open(path)?;
    checksum_reader(file, window)
}

fn checksum_reader(reader: impl Read, limit: u64) -> Result<String, TransferError> {
    let mut reader = reader.take(limit);
    let mut ctx = md5::Context::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(hex::encode(ctx.compute().0))
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a file in fixed-size sequential windows with per-chunk MD5.
pub struct ChunkReader {
    file: std::fs::File,
    chunk_size: usize,
    index: u32,
    offset: u64,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (4 MiB) is used.
    pub fn new(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            chunk_size,
            index: 0,
            offset: 0,
            file_size,
        })
    }

    /// Reads the next chunk. Returns `None` at EOF.
    ///
    /// A short read is filled before returning, so every chunk except the
    /// last is exactly `chunk_size` bytes.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let remaining = self.file_size.saturating_sub(self.offset);
        if remaining == 0 {
            return Ok(None);
        }

        let read_size = remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; read_size];
        let mut filled = 0;
        while filled < read_size {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);

        let chunk = Chunk {
            index: self.index,
            offset: self.offset,
            checksum: checksum_bytes(&buf),
            data: buf,
        };
        self.index += 1;
        self.offset += filled as u64;
        Ok(Some(chunk))
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.offset)
    }
}

// ---------------------------------------------------------------------------
// Split / join
// ---------------------------------------------------------------------------

/// Splits `path` into chunk files `<name>.<index>` inside `scratch_dir`.
///
/// Chunk files already written are removed again if a later chunk fails, so
/// an error leaves nothing behind.
pub fn split_file(
    path: &Path,
    scratch_dir: &Path,
    chunk_size: usize,
) -> Result<ChunkManifest, TransferError> {
    split_with(path, scratch_dir, chunk_size, |p: &Path| std::fs::File::create(p))
}

fn split_with<W: Write>(
    path: &Path,
    scratch_dir: &Path,
    chunk_size: usize,
    mut open: impl FnMut(&Path) -> io::Result<W>,
) -> Result<ChunkManifest, TransferError> {
    let name = path
        .file_name()
        .ok_or_else(|| TransferError::InvalidPath(path.display().to_string()))?
        .to_string_lossy()
        .into_owned();
    std::fs::create_dir_all(scratch_dir)?;

    let mut reader = ChunkReader::new(path, chunk_size)?;
    let mut manifest = ChunkManifest::default();
    let result = (|| {
        while let Some(chunk) = reader.next_chunk()? {
            let chunk_path = scratch_dir.join(format!("{name}.{}", chunk.index));
            // Recorded before the file exists so a failed write is cleaned up.
            manifest.chunks.push(ChunkFile {
                index: chunk.index,
                path: chunk_path.clone(),
                md5: chunk.checksum,
                size: chunk.data.len() as u64,
            });
            let mut out = open(&chunk_path)?;
            out.write_all(&chunk.data)?;
            out.flush()?;
        }
        Ok::<_, TransferError>(())
    })();

    if let Err(e) = result {
        remove_chunk_files(&manifest);
        return Err(e);
    }

    tracing::debug!(
        file = %path.display(),
        chunks = manifest.chunks.len(),
        bytes = manifest.total_size(),
        "split file"
    );
    Ok(manifest)
}

/// Concatenates the chunks of `manifest` into `dest` in index order,
/// verifying each chunk's digest. Returns the number of bytes written.
pub fn join_chunks(manifest: &ChunkManifest, dest: &Path) -> Result<u64, TransferError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::fs::File::create(dest)?;
    let mut written = 0u64;
    for chunk in &manifest.chunks {
        let data = std::fs::read(&chunk.path)?;
        if checksum_bytes(&data) != chunk.md5 {
            return Err(TransferError::ChecksumMismatch { index: chunk.index });
        }
        out.write_all(&data)?;
        written += data.len() as u64;
    }
    out.flush()?;
    Ok(written)
}

/// Removes one chunk file. A file that is already gone is not an error.
pub fn remove_chunk_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Removes every chunk file of `manifest`, logging failures. Returns how
/// many files could not be removed.
pub fn remove_chunk_files(manifest: &ChunkManifest) -> usize {
    let mut failed = 0;
    for path in manifest.chunks.iter().map(|c| &c.path) {
        if let Err(e) = remove_chunk_file(path) {
            tracing::warn!(chunk = %path.display(), error = %e, "failed to remove chunk file");
            failed += 1;
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    fn chunk_paths(scratch_dir: &Path, name: &str, count: u32) -> Vec<PathBuf> {
        (0..count)
            .map(|i| scratch_dir.join(format!("{name}.{i}")))
            .collect()
    }

    #[test]
    fn checksum_bytes_known_value() {
        assert_eq!(checksum_bytes(b"hello"), "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(checksum_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn calculate_file_checksum_matches_bytes() {
        let dir = TempDir::new().unwrap();
        let data = b"test content for checksum";
        let path = create_test_file(dir.path(), "test.bin", data);
        assert_eq!(calculate_file_checksum(&path).unwrap(), checksum_bytes(data));
    }

    #[test]
    fn leading_window_only_reads_prefix() {
        let dir = TempDir::new().unwrap();
        let a = create_test_file(dir.path(), "a.bin", b"samehead-tail-one");
        let b = create_test_file(dir.path(), "b.bin", b"samehead-tail-two");
        assert_eq!(
            checksum_leading_window(&a, 8).unwrap(),
            checksum_leading_window(&b, 8).unwrap()
        );
        assert_eq!(checksum_leading_window(&a, 8).unwrap(), checksum_bytes(b"samehead"));
        assert_ne!(
            calculate_file_checksum(&a).unwrap(),
            calculate_file_checksum(&b).unwrap()
        );
    }

    #[test]
    fn leading_window_larger_than_file() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "s.bin", b"hello");
        assert_eq!(
            checksum_leading_window(&path, 4096).unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn chunk_reader_reads_all() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");

        let mut reader = ChunkReader::new(&path, 4).unwrap();
        assert_eq!(reader.file_size(), 10);

        let c1 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c1.index, c1.offset), (0, 0));
        assert_eq!(&c1.data, b"AABB");
        assert_eq!(c1.checksum, checksum_bytes(b"AABB"));
        assert_eq!(reader.remaining(), 6);

        let c2 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c2.index, c2.offset), (1, 4));
        assert_eq!(&c2.data, b"CCDD");

        let c3 = reader.next_chunk().unwrap().unwrap();
        assert_eq!((c3.index, c3.offset), (2, 8));
        assert_eq!(&c3.data, b"EE");

        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn chunk_reader_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "empty.bin", b"");
        let mut reader = ChunkReader::new(&path, 4).unwrap();
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn split_names_chunks_by_index() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("tmp");
        let path = create_test_file(dir.path(), "big.bin", b"0123456789");

        let manifest = split_file(&path, &scratch, 4).unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.total_size(), 10);
        let expected = chunk_paths(&scratch, "big.bin", 3);
        let actual: Vec<_> = manifest.chunks.iter().map(|c| c.path.clone()).collect();
        assert_eq!(actual, expected);
        assert_eq!(
            manifest.block_list(),
            vec![
                checksum_bytes(b"0123"),
                checksum_bytes(b"4567"),
                checksum_bytes(b"89"),
            ]
        );
        assert_eq!(std::fs::read(&expected[2]).unwrap(), b"89");
    }

    #[test]
    fn split_join_roundtrip() {
        let dir = TempDir::new().unwrap();
        let original: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let path = create_test_file(dir.path(), "data.bin", &original);

        let manifest = split_file(&path, &dir.path().join("tmp"), 1024).unwrap();
        assert_eq!(manifest.len(), 10);
        let dest = dir.path().join("out").join("data.bin");
        assert_eq!(join_chunks(&manifest, &dest).unwrap(), 10_000);
        assert_eq!(std::fs::read(&dest).unwrap(), original);
    }

    #[test]
    fn join_detects_corrupt_chunk() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "data.bin", b"aaaabbbb");
        let manifest = split_file(&path, &dir.path().join("tmp"), 4).unwrap();
        std::fs::write(&manifest.chunks[1].path, b"XXXX").unwrap();

        let err = join_chunks(&manifest, &dir.path().join("out.bin")).unwrap_err();
        assert!(matches!(err, TransferError::ChecksumMismatch { index: 1 }));
    }

    #[test]
    fn remove_chunk_files_ignores_missing() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "data.bin", b"aaaabbbbcc");
        let manifest = split_file(&path, &dir.path().join("tmp"), 4).unwrap();
        remove_chunk_file(&manifest.chunks[0].path).unwrap();

        assert_eq!(remove_chunk_files(&manifest), 0);
        for chunk in &manifest.chunks {
            assert!(!chunk.path.exists());
        }
        // Second pass over already-removed files.
        assert_eq!(remove_chunk_files(&manifest), 0);
    }

    /// Accepts a few bytes, then fails like a full disk.
    struct FullDisk {
        room: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.room == 0 {
                return Err(io::Error::other("no space left on device"));
            }
            let n = buf.len().min(self.room);
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn split_write_failure_leaves_scratch_empty() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("tmp");
        let data: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 251) as u8).collect();
        let path = create_test_file(dir.path(), "big.bin", &data);

        let mut opened = 0;
        let err = split_with(&path, &scratch, 4096, |p| {
            // The file lands on disk before the write fails.
            std::fs::File::create(p)?;
            opened += 1;
            Ok(FullDisk {
                room: if opened > 3 { 100 } else { usize::MAX },
            })
        })
        .unwrap_err();

        assert!(matches!(err, TransferError::Io(_)));
        assert_eq!(opened, 4);
        let left: Vec<_> = std::fs::read_dir(&scratch).unwrap().collect();
        assert!(left.is_empty(), "chunk files left behind: {left:?}");
    }

    #[test]
    fn split_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = split_file(&dir.path().join("nope"), dir.path(), 4).unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }
}
