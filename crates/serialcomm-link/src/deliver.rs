use std::sync::mpsc;

use tracing::warn;

/// Receives every accepted item, in arrival order, on the receiver thread.
///
/// Any `FnMut(M) + Send` closure is a `Deliver`.
pub trait Deliver<M>: Send {
    fn deliver(&mut self, item: M);
}

impl<M, F> Deliver<M> for F
where
    F: FnMut(M) + Send,
{
    fn deliver(&mut self, item: M) {
        self(item)
    }
}

/// Hands items to an `mpsc` queue for processing on another thread.
///
/// Items accepted after the queue's receiving end is dropped are discarded
/// with a warning; the frame has already been acknowledged by then.
#[derive(Debug)]
pub struct ChannelDelivery<M> {
    tx: mpsc::Sender<M>,
}

impl<M> ChannelDelivery<M> {
    pub fn new(tx: mpsc::Sender<M>) -> Self {
        Self { tx }
    }

    /// A delivery and the queue it feeds.
    pub fn channel() -> (Self, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }
}

impl<M: Send> Deliver<M> for ChannelDelivery<M> {
    fn deliver(&mut self, item: M) {
        if self.tx.send(item).is_err() {
            warn!("delivery queue closed, dropping accepted item");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliver_all<D: Deliver<u32>>(sink: &mut D, items: &[u32]) {
        for item in items {
            sink.deliver(*item);
        }
    }

    #[test]
    fn closures_deliver() {
        let mut seen = Vec::new();
        deliver_all(&mut |item: u32| seen.push(item), &[1, 2, 3]);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn channel_preserves_order() {
        let (mut sink, rx) = ChannelDelivery::channel();
        deliver_all(&mut sink, &[7, 8]);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![7, 8]);
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (mut sink, rx) = ChannelDelivery::channel();
        drop(rx);
        sink.deliver(1u32);
    }
}
