//! Response transport for streamed bodies.
//!
//! A [`ResponseWriter`] is the producing half: it writes the response head
//! once, then body chunks, and ends the response when dropped. The matching
//! [`PendingResponse`] is handed to axum; it waits for the head and turns the
//! chunk channel into the response body. The bounded channel is the
//! backpressure: `write_chunk` waits until the client side has room.

use std::io;

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream;
use tokio::sync::{mpsc, oneshot};

use crate::error::ServeError;
use crate::pipeline::PipelineError;

/// Chunks buffered between the pipeline and the connection.
pub const CHANNEL_DEPTH: usize = 4;

enum Head {
    Headers(HeaderMap),
    Failed(ServeError),
}

/// Creates a connected writer/response pair.
pub fn response_channel(depth: usize) -> (ResponseWriter, PendingResponse) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(depth.max(1));

    (
        ResponseWriter {
            head: Some(head_tx),
            body: body_tx,
        },
        PendingResponse {
            head: head_rx,
            body: body_rx,
        },
    )
}

// == Writer ==
/// Producing half of a streamed response.
#[derive(Debug)]
pub struct ResponseWriter {
    head: Option<oneshot::Sender<Head>>,
    body: mpsc::Sender<io::Result<Bytes>>,
}

impl ResponseWriter {
    /// Whether the response head has gone out.
    pub fn headers_sent(&self) -> bool {
        self.head.is_none()
    }

    /// Whether the client side has gone away.
    pub fn is_closed(&self) -> bool {
        self.body.is_closed()
    }

    /// Sends the response head. Later calls are ignored.
    pub fn write_headers(&mut self, headers: HeaderMap) -> Result<(), PipelineError> {
        match self.head.take() {
            Some(head) => head
                .send(Head::Headers(headers))
                .map_err(|_| PipelineError::SinkClosed),
            None => Ok(()),
        }
    }

    /// Sends one body chunk, waiting while the channel is full.
    pub async fn write_chunk(&self, chunk: Bytes) -> Result<(), PipelineError> {
        self.body
            .send(Ok(chunk))
            .await
            .map_err(|_| PipelineError::SinkClosed)
    }

    /// Aborts the response.
    ///
    /// Before the head is out this becomes a 500; afterwards the body ends in
    /// an error, which drops the connection without a second head.
    pub async fn fail(mut self, error: io::Error) {
        match self.head.take() {
            Some(head) => {
                let _ = head.send(Head::Failed(ServeError::Stream(error)));
            }
            None => {
                let _ = self.body.send(Err(error)).await;
            }
        }
    }

    /// Ends the response.
    pub fn end(self) {}
}

// == Pending Response ==
/// Consuming half, turned into the axum response.
#[derive(Debug)]
pub struct PendingResponse {
    head: oneshot::Receiver<Head>,
    body: mpsc::Receiver<io::Result<Bytes>>,
}

impl PendingResponse {
    /// Waits for the head and builds a streaming response.
    pub async fn into_response(self, status: StatusCode) -> Response {
        match self.head.await {
            Ok(Head::Headers(headers)) => {
                let chunks = stream::unfold(self.body, |mut rx| async move {
                    rx.recv().await.map(|chunk| (chunk, rx))
                });
                let mut response = Body::from_stream(chunks).into_response();
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Ok(Head::Failed(error)) => error.into_response(),
            // Writer dropped without a head
            Err(_) => ServeError::Internal("Response abandoned".to_string()).into_response(),
        }
    }
}

impl std::fmt::Debug for Head {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Head::Headers(h) => f.debug_tuple("Headers").field(h).finish(),
            Head::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}
