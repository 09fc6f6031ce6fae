//! In-process duplex channels.
use crate::{
    BoxFuture,
    error::CallError,
    stream::{Direction, MessageChannel, StreamFrame},
};
use tokio::sync::mpsc;

/// Frames buffered per direction when no capacity is given.
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// One end of an in-process duplex channel.
///
/// Half-closing drops the sender, so the peer observes end of stream after draining the
/// frames already buffered.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: Option<mpsc::Sender<StreamFrame>>,
    rx: mpsc::Receiver<StreamFrame>,
}

/// Creates two connected channel ends, each buffering up to `capacity` frames.
pub fn channel_pair(capacity: usize) -> (MemoryChannel, MemoryChannel) {
    let capacity = capacity.max(1);
    let (left_tx, left_rx) = mpsc::channel(capacity);
    let (right_tx, right_rx) = mpsc::channel(capacity);
    (
        MemoryChannel {
            tx: Some(left_tx),
            rx: right_rx,
        },
        MemoryChannel {
            tx: Some(right_tx),
            rx: left_rx,
        },
    )
}

impl MessageChannel for MemoryChannel {
    fn send(&mut self, frame: StreamFrame) -> BoxFuture<'_, Result<(), CallError>> {
        Box::pin(async move {
            let tx = self
                .tx
                .as_ref()
                .ok_or(CallError::StreamClosed(Direction::Send))?;
            tx.send(frame)
                .await
                .map_err(|_| CallError::transport("peer dropped the stream"))
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<Option<StreamFrame>, CallError>> {
        Box::pin(async move { Ok(self.rx.recv().await) })
    }

    fn close_send(&mut self) -> BoxFuture<'_, Result<(), CallError>> {
        self.tx = None;
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_close_send_ends_the_peer_after_buffered_frames() {
        let (mut left, mut right) = channel_pair(DEFAULT_STREAM_CAPACITY);

        left.send(StreamFrame::Message(Bytes::from_static(b"a")))
            .await
            .unwrap();
        left.close_send().await.unwrap();

        assert_eq!(
            right.recv().await.unwrap(),
            Some(StreamFrame::Message(Bytes::from_static(b"a")))
        );
        assert_eq!(right.recv().await.unwrap(), None);
        assert!(matches!(
            left.send(StreamFrame::Failure("late".to_string())).await,
            Err(CallError::StreamClosed(Direction::Send))
        ));
    }

    #[tokio::test]
    async fn test_send_to_a_dropped_peer_is_a_transport_error() {
        let (mut left, right) = channel_pair(1);
        drop(right);

        let err = left
            .send(StreamFrame::Message(Bytes::new()))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
