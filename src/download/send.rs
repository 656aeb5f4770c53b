//! Upload helpers: an `InputFile` whose reads are reported to a progress sink.

use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use teloxide::types::InputFile;
use tokio::fs::File as TokioFile;
use tokio::io::{AsyncRead, ReadBuf};

use crate::download::error::JobError;
use crate::download::progress::ProgressSink;

/// An `AsyncRead` wrapper that reports every chunk read to a [`ProgressSink`].
pub struct ProgressReader<R> {
    inner: R,
    sink: ProgressSink,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, sink: ProgressSink) -> Self {
        Self { inner, sink }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let read = buf.filled().len().saturating_sub(before);
            if read > 0 {
                self.sink.add_bytes(read as u64);
            }
        }
        poll
    }
}

/// Opens `path` for upload under `file_name`, feeding read progress to `sink`.
pub async fn input_file_with_progress(path: &Path, file_name: &str, sink: ProgressSink) -> Result<InputFile, JobError> {
    log::debug!("Opening {} for upload as {}", path.display(), file_name);
    let file = TokioFile::open(path)
        .await
        .map_err(|e| JobError::Disk(format!("cannot open {}: {}", path.display(), e)))?;
    Ok(InputFile::read(ProgressReader::new(file, sink)).file_name(file_name.to_string()))
}
