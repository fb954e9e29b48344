use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::core::error::{Error, Result};

/// A text file held open for reading.
///
/// The handle is released when the reader is dropped, on every exit path.
/// [`read_all_text`](Self::read_all_text) borrows the reader, so the file
/// cannot be closed while a read is still in flight.
#[derive(Debug)]
pub struct ScopedReader {
    path: PathBuf,
    inner: BufReader<File>,
}

impl ScopedReader {
    /// Opens `path`, failing with [`Error::Io`] (`NotFound`) if it is absent.
    pub async fn open_for_read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        log::debug!("opened '{}'", path.display());

        Ok(ScopedReader {
            path,
            inner: BufReader::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_all_text(&mut self) -> Result<String> {
        let mut text = String::new();
        self.inner
            .read_to_string(&mut text)
            .await
            .map_err(|source| Error::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(text)
    }
}

impl Drop for ScopedReader {
    fn drop(&mut self) {
        log::debug!("released '{}'", self.path.display());
    }
}

/// Opens `path`, reads it to the end and releases it before returning.
pub async fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let mut reader = ScopedReader::open_for_read(path).await?;
    // Awaited inside the reader's scope.
    let text = reader.read_all_text().await?;
    drop(reader);
    Ok(text)
}
