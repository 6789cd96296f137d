//! Stream Pipeline Module
//!
//! Carries a file's bytes from disk to the client through optional minify
//! and gzip stages, capturing the final output for the cache on the way.
//!
//! ```text
//! disk ─▶ [minify] ─▶ [gzip] ─▶ tee ─▶ ResponseWriter ─▶ client
//!                                 └──▶ ByteCache (on completion)
//! ```

mod gzip;
mod minify;
mod sink;
mod tee;

use std::io;
use std::path::Path;

use axum::http::HeaderMap;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;

pub use gzip::{accepts_gzip, gzip_stage};
pub use minify::Minifier;
pub use sink::{response_channel, PendingResponse, ResponseWriter, CHANNEL_DEPTH};
pub use tee::{CacheFill, Tee};

use crate::files::is_compressible;

/// A lazy, single-pass sequence of body chunks.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Why a pipeline run stopped early.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Disk read or transform failed
    #[error("Stream failure: {0}")]
    Stream(#[from] io::Error),

    /// The client went away
    #[error("Sink closed")]
    SinkClosed,
}

// == Transforms ==
/// Stages to apply to one response, always in minify-then-gzip order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transforms {
    pub minify: Option<Minifier>,
    pub gzip: bool,
}

impl Transforms {
    /// Chooses stages for a file.
    ///
    /// Neither stage touches content outside the compressible types; gzip
    /// additionally needs the client to accept it.
    pub fn plan(path: &Path, content_type: &str, minify: bool, gzip: bool, client_gzip: bool) -> Self {
        if !is_compressible(content_type) {
            return Self::default();
        }
        Self {
            minify: if minify { Minifier::for_path(path) } else { None },
            gzip: gzip && client_gzip,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.minify.is_none() && !self.gzip
    }

    /// Chains the stages onto a source stream.
    pub fn apply(&self, source: ByteStream) -> ByteStream {
        let stream = match self.minify {
            Some(minifier) => minifier.stage(source),
            None => source,
        };
        if self.gzip {
            gzip_stage(stream)
        } else {
            stream
        }
    }
}

// == Run ==
/// Streams `body` to `writer`, teeing every chunk.
///
/// The head goes out with the first chunk (or at the end for an empty body).
/// A stream error fails the response: a 500 if nothing was sent yet,
/// otherwise a dropped connection. A closed sink stops the run at the next
/// write. Only a run that reaches the end of the stream finishes the tee, and
/// the writer is released after the tee so the cache is filled by the time
/// the client sees the end of the body.
pub async fn run(
    mut body: ByteStream,
    mut writer: ResponseWriter,
    headers: HeaderMap,
    mut tee: Tee,
) -> Result<u64, PipelineError> {
    let mut headers = Some(headers);
    let mut sent = 0u64;

    while let Some(next) = body.next().await {
        if writer.is_closed() {
            return Err(PipelineError::SinkClosed);
        }

        let chunk = match next {
            Ok(chunk) => chunk,
            Err(e) => {
                writer.fail(io::Error::new(e.kind(), e.to_string())).await;
                return Err(PipelineError::Stream(e));
            }
        };

        if let Some(head) = headers.take() {
            writer.write_headers(head)?;
        }
        tee.capture(&chunk);
        sent += chunk.len() as u64;
        writer.write_chunk(chunk).await?;
    }

    if let Some(head) = headers.take() {
        writer.write_headers(head)?;
    }
    tee.finish().await;
    writer.end();
    Ok(sent)
}
