//! Bounded FIFO work queue handed between the acceptor and the worker pool
//! (spec.md §3 "Work queue slot", §4.6, §4.7, §5).
//!
//! A fixed-capacity ring buffer guarded by a mutex held only across index
//! updates, plus the two counting semaphores from
//! `original_source/proxy/proxy.c`'s `req_queue`/`idle_sem`/`req_sem`:
//! `idle` counts currently-idle workers (the acceptor waits on it before
//! enqueueing), `pending` counts enqueued-but-unprocessed slots (workers
//! wait on it before dequeueing).
//!
//! Generic over the slot type so the queue's ring/invariant logic can be
//! unit-tested without opening real sockets; [`crate::server`] instantiates
//! it with the crate's actual `(TcpStream, SocketAddr)` pair.

use parking_lot::Mutex;

use crate::semaphore::Semaphore;

struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
}

pub struct WorkQueue<T> {
    capacity: usize,
    ring: Mutex<Ring<T>>,
    /// Workers post, the acceptor waits: counts idle worker capacity.
    pub idle: Semaphore,
    /// The acceptor posts, workers wait: counts pending queue entries.
    pub pending: Semaphore,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        WorkQueue {
            capacity,
            ring: Mutex::new(Ring {
                slots,
                head: 0,
                tail: 0,
            }),
            idle: Semaphore::new(0),
            pending: Semaphore::new(0),
        }
    }

    /// spec.md §4.7 acceptor step: wait for idle capacity, then enqueue.
    /// Blocks on `idle` before taking the ring-index lock, so the lock is
    /// never held across the semaphore wait (and never across I/O).
    pub fn push(&self, item: T) {
        self.idle.wait();
        {
            let mut ring = self.ring.lock();
            let next_tail = (ring.tail + 1) % self.capacity;
            // spec.md §9 Open Questions: the acceptor's gating on `idle`
            // is what prevents ring overflow; assert the invariant rather
            // than silently corrupting an unread slot.
            debug_assert!(
                next_tail != ring.head,
                "queue overflow: idle semaphore invariant violated"
            );
            ring.slots[ring.tail] = Some(item);
            ring.tail = next_tail;
        }
        self.pending.post();
    }

    /// spec.md §4.6 worker step: wait for pending work, then dequeue.
    pub fn pop(&self) -> T {
        self.pending.wait();
        let mut ring = self.ring.lock();
        let item = ring.slots[ring.head]
            .take()
            .expect("pending semaphore guarantees a populated slot");
        ring.head = (ring.head + 1) % self.capacity;
        item
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        let ring = self.ring.lock();
        ring.head == ring.tail
    }
}
