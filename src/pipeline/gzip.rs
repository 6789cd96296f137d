//! Streaming gzip stage.
//!
//! Each input chunk is pushed through a `flate2` encoder and whatever
//! compressed output it has produced so far is emitted right away, so the
//! response starts before the file is fully read.

use std::io::Write;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::{stream, StreamExt};

use crate::pipeline::ByteStream;

struct GzipState {
    input: ByteStream,
    /// `None` once the trailer has been written or an error was emitted
    encoder: Option<GzEncoder<Vec<u8>>>,
}

/// Wraps a byte stream in a gzip encoder.
pub fn gzip_stage(input: ByteStream) -> ByteStream {
    let state = GzipState {
        input,
        encoder: Some(GzEncoder::new(Vec::new(), Compression::default())),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            let encoder = state.encoder.as_mut()?;

            match state.input.next().await {
                Some(Ok(chunk)) => {
                    if let Err(e) = encoder.write_all(&chunk) {
                        state.encoder = None;
                        return Some((Err(e), state));
                    }
                    let produced = std::mem::take(encoder.get_mut());
                    if !produced.is_empty() {
                        return Some((Ok(Bytes::from(produced)), state));
                    }
                }
                Some(Err(e)) => {
                    state.encoder = None;
                    return Some((Err(e), state));
                }
                None => {
                    let encoder = state.encoder.take()?;
                    let item = encoder.finish().map(Bytes::from);
                    return Some((item, state));
                }
            }
        }
    })
    .boxed()
}

/// Whether the request's `Accept-Encoding` admits gzip.
///
/// `gzip` or `*` with a q-value above zero counts; `gzip;q=0` refuses it.
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    let Some(header) = accept_encoding else {
        return false;
    };

    header.split(',').any(|item| {
        let mut parts = item.split(';');
        let coding = parts.next().unwrap_or_default().trim();
        if !coding.eq_ignore_ascii_case("gzip") && coding != "*" {
            return false;
        }
        parts
            .filter_map(|param| param.trim().strip_prefix("q="))
            .all(|q| q.trim().parse::<f32>().map(|q| q > 0.0).unwrap_or(false))
    })
}
