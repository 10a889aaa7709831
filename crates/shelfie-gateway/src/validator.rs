//! Upload validation
//!
//! Declared MIME type is attacker-controlled metadata; the leading bytes of
//! the payload are the source of truth for what the bytes actually are.
//! The validator sniffs the payload signature, requires it to agree with
//! the declared type, and decides the canonical extension itself so a
//! caller can never pair a `.png` path with JPEG content.
//!
//! Size is enforced twice: the declared size up front, and the bytes
//! actually read while streaming, via a counting reader that trips a guard
//! the gateway checks when a backend write fails.

use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use shelfie_core::{ImageFormat, ObjectError};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// Longest signature we need: `RIFF....WEBP`.
const SNIFF_LEN: usize = 12;

/// A validated upload: the reassembled stream (sniffed prefix plus the
/// remainder, capped at the ceiling) and the format the bytes proved to be.
pub struct ValidatedUpload {
    pub reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    pub format: ImageFormat,
    limit_tripped: Arc<AtomicBool>,
}

impl ValidatedUpload {
    /// Handle for checking, after the stream has been consumed, whether it
    /// was cut off for crossing the size ceiling.
    pub fn limit_guard(&self) -> Arc<AtomicBool> {
        self.limit_tripped.clone()
    }
}

pub struct UploadValidator {
    max_size_bytes: u64,
}

impl UploadValidator {
    pub fn new(max_size_bytes: u64) -> Self {
        UploadValidator { max_size_bytes }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Validate a declared type and payload stream.
    ///
    /// Rejects with `TooLarge` when the declared size exceeds the ceiling,
    /// and `UnsupportedType` when the signature is unknown or disagrees
    /// with the declared MIME type. No byte reaches a backend before these
    /// checks pass.
    pub async fn validate(
        &self,
        declared_mime: &str,
        declared_size: Option<u64>,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> Result<ValidatedUpload, ObjectError> {
        if let Some(size) = declared_size {
            if size > self.max_size_bytes {
                return Err(ObjectError::TooLarge {
                    limit_bytes: self.max_size_bytes,
                });
            }
        }

        let mut prefix = [0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            let n = reader
                .read(&mut prefix[filled..])
                .await
                .map_err(|_| ObjectError::UnsupportedType)?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let format = sniff_format(&prefix[..filled]).ok_or(ObjectError::UnsupportedType)?;

        if normalize_mime(declared_mime) != format.mime() {
            tracing::debug!(
                declared = %declared_mime,
                sniffed = %format.mime(),
                "Rejected upload: declared type disagrees with payload signature"
            );
            return Err(ObjectError::UnsupportedType);
        }

        let limit_tripped = Arc::new(AtomicBool::new(false));
        let chained = Cursor::new(prefix[..filled].to_vec()).chain(reader);
        let limited = LimitedReader::new(chained, self.max_size_bytes, limit_tripped.clone());

        Ok(ValidatedUpload {
            reader: Box::pin(limited),
            format,
            limit_tripped,
        })
    }
}

/// Match leading bytes against the fixed signature table.
fn sniff_format(prefix: &[u8]) -> Option<ImageFormat> {
    if prefix.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if prefix.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some(ImageFormat::Png)
    } else if prefix.len() >= SNIFF_LEN && &prefix[0..4] == b"RIFF" && &prefix[8..12] == b"WEBP" {
        Some(ImageFormat::Webp)
    } else {
        None
    }
}

/// Normalize a MIME type by stripping parameters and case
/// (e.g. "IMAGE/JPEG; charset=utf-8" -> "image/jpeg").
fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

/// Passes bytes through until one more than `limit` has been read, then
/// fails the stream and sets the shared trip flag.
struct LimitedReader<R> {
    inner: R,
    limit: u64,
    consumed: u64,
    tripped: Arc<AtomicBool>,
}

impl<R> LimitedReader<R> {
    fn new(inner: R, limit: u64, tripped: Arc<AtomicBool>) -> Self {
        LimitedReader {
            inner,
            limit,
            consumed: 0,
            tripped,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LimitedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();

        if this.tripped.load(Ordering::Relaxed) {
            return Poll::Ready(Err(size_limit_error()));
        }

        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.consumed += (buf.filled().len() - before) as u64;
                if this.consumed > this.limit {
                    this.tripped.store(true, Ordering::Relaxed);
                    return Poll::Ready(Err(size_limit_error()));
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

fn size_limit_error() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "upload exceeds configured size limit",
    )
}
