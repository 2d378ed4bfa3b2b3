//! Transport seam: the durable point-to-point queue the stages exchange
//! work over.
//!
//! The broker itself is an external collaborator (at-least-once delivery,
//! FIFO per queue, explicit acknowledgment); this module specifies it as
//! the [`Transport`] trait and ships an in-memory implementation used by
//! the single-process pipeline runner and the tests. A real broker client
//! implements the same trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use dp_core::{Error, Result};

/// One message received from a queue, pending acknowledgment.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Queue the message was consumed from.
    pub queue: String,
    /// Broker-assigned delivery tag, used to acknowledge.
    pub tag: u64,
    /// Raw message payload.
    pub payload: Vec<u8>,
}

/// A point-to-point queue transport.
pub trait Transport {
    /// Publish a payload to the named queue, creating it if needed.
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<()>;

    /// Receive the next message from the named queue.
    ///
    /// Blocks until a message arrives, or until `timeout` elapses when one
    /// is given; a timeout yields `Ok(None)` so terminal consumers can
    /// stop cleanly.
    fn consume(&self, queue: &str, timeout: Option<Duration>) -> Result<Option<Delivery>>;

    /// Acknowledge a delivery. Unacknowledged messages are the broker's
    /// concern (redelivery under the at-least-once contract).
    fn ack(&self, delivery: &Delivery) -> Result<()>;
}

type Channel = (Sender<Delivery>, Receiver<Delivery>);

/// In-memory broker: one unbounded FIFO channel per queue name.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, Channel>>,
    next_tag: AtomicU64,
    acked: Mutex<Vec<u64>>,
}

impl InMemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, queue: &str) -> Channel {
        let mut queues = self.queues.lock().expect("broker lock poisoned");
        queues.entry(queue.to_string()).or_insert_with(unbounded).clone()
    }

    /// Tags acknowledged so far, in acknowledgment order.
    pub fn acked_tags(&self) -> Vec<u64> {
        self.acked.lock().expect("broker lock poisoned").clone()
    }

    /// Number of messages currently queued on `queue`.
    pub fn depth(&self, queue: &str) -> usize {
        self.channel(queue).1.len()
    }
}

impl Transport for InMemoryBroker {
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed) + 1;
        let delivery = Delivery { queue: queue.to_string(), tag, payload: payload.to_vec() };
        self.channel(queue)
            .0
            .send(delivery)
            .map_err(|_| Error::Connection(format!("queue '{queue}' is closed")))
    }

    fn consume(&self, queue: &str, timeout: Option<Duration>) -> Result<Option<Delivery>> {
        let (_, rx) = self.channel(queue);
        match timeout {
            Some(t) => match rx.recv_timeout(t) {
                Ok(d) => Ok(Some(d)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(Error::Connection(format!("queue '{queue}' is closed")))
                }
            },
            None => rx
                .recv()
                .map(Some)
                .map_err(|_| Error::Connection(format!("queue '{queue}' is closed"))),
        }
    }

    fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.acked.lock().expect("broker lock poisoned").push(delivery.tag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_consume_fifo() {
        let broker = InMemoryBroker::new();
        broker.publish("q", b"one").unwrap();
        broker.publish("q", b"two").unwrap();

        let d1 = broker.consume("q", None).unwrap().unwrap();
        let d2 = broker.consume("q", None).unwrap().unwrap();
        assert_eq!(d1.payload, b"one");
        assert_eq!(d2.payload, b"two");
        assert!(d1.tag < d2.tag);
    }

    #[test]
    fn consume_times_out_on_empty_queue() {
        let broker = InMemoryBroker::new();
        let got = broker.consume("empty", Some(Duration::from_millis(10))).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn queues_are_independent() {
        let broker = InMemoryBroker::new();
        broker.publish("a", b"x").unwrap();
        assert_eq!(broker.depth("a"), 1);
        assert_eq!(broker.depth("b"), 0);
    }

    #[test]
    fn acks_are_recorded() {
        let broker = InMemoryBroker::new();
        broker.publish("q", b"x").unwrap();
        let d = broker.consume("q", None).unwrap().unwrap();
        broker.ack(&d).unwrap();
        assert_eq!(broker.acked_tags(), vec![d.tag]);
    }
}
