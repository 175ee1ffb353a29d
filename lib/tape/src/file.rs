use crate::error::TapeResult;
use async_compression::tokio::bufread::GzipDecoder;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncRead, BufReader};

pub type TapeReader = Pin<Box<dyn AsyncRead + Send>>;

const LOST_AND_FOUND: &str = "lost+found";

/// Opens a recording file, transparently decompressing `.gz` files.
pub async fn open_tape(path: &Path) -> TapeResult<TapeReader> {
    let file = tokio::fs::File::open(path).await?;
    let reader = BufReader::new(file);
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut decoder = GzipDecoder::new(reader);
        decoder.multiple_members(true);
        Ok(Box::pin(decoder))
    } else {
        Ok(Box::pin(reader))
    }
}

/// Lists recording files at `path`.
///
/// A file path yields itself. A directory yields its regular files in lexicographic
/// order, skipping `lost+found`.
pub async fn list_tapes(path: &Path) -> TapeResult<Vec<PathBuf>> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut tapes = Vec::new();
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name() == LOST_AND_FOUND {
            continue;
        }
        if entry.file_type().await?.is_file() {
            tapes.push(entry.path());
        }
    }
    tapes.sort();
    Ok(tapes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::RecordIterator;
    use crate::writer::TapeWriter;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tokio::sync::watch;

    #[tokio::test]
    async fn directory_listing_is_sorted_and_skips_lost_and_found() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.tape", "a.tape.gz", "c.tape"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join(LOST_AND_FOUND)).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let tapes = list_tapes(dir.path()).await.unwrap();
        let names: Vec<_> = tapes
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.tape.gz", "b.tape", "c.tape"]);

        let single = dir.path().join("c.tape");
        assert_eq!(list_tapes(&single).await.unwrap(), vec![single]);
    }

    #[tokio::test]
    async fn gzip_tapes_are_decompressed() {
        let mut writer = TapeWriter::new(GzEncoder::new(Vec::new(), Compression::default()));
        writer
            .write_result("eth", "getCode", br#"["0x0000000000000000000000000000000000000002","latest"]"#, b"\"0x60\"", 3, 0)
            .unwrap();
        let compressed = writer.into_inner().finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.gz");
        std::fs::write(&path, compressed).unwrap();

        let (_stop_sender, stop) = watch::channel(false);
        let mut iter = RecordIterator::new(open_tape(&path).await.unwrap(), 4, stop);
        assert!(iter.next().await);
        assert_eq!(iter.value().unwrap().query.method, "eth_getCode");
        assert!(!iter.next().await);
        assert!(iter.error().is_none());
        iter.close().await;
    }
}
