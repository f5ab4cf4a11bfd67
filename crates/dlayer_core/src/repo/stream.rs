//! Consumer handle for repository result streams.

use crate::envelope::OpResult;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Receiving end of one repository operation.
///
/// Yields `None` once the producing task has finished. Dropping or closing
/// the stream tells the producer to stop.
#[derive(Debug)]
pub struct ResultStream<R> {
    rx: mpsc::Receiver<OpResult<R>>,
}

impl<R> ResultStream<R> {
    pub(crate) fn new(rx: mpsc::Receiver<OpResult<R>>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<OpResult<R>> {
        self.rx.recv().await
    }

    /// Blocking variant of `next` for callers outside the async runtime.
    ///
    /// # Panics
    /// Panics when called from within an async execution context.
    pub fn blocking_next(&mut self) -> Option<OpResult<R>> {
        self.rx.blocking_recv()
    }

    /// Drains the stream to completion.
    pub async fn collect_all(mut self) -> Vec<OpResult<R>> {
        let mut results = Vec::new();
        while let Some(result) = self.rx.recv().await {
            results.push(result);
        }
        results
    }

    /// Stops accepting new results; already buffered ones can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<R> Stream for ResultStream<R> {
    type Item = OpResult<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
