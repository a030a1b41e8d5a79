//! Bounded, interrupt-drained command queue.
//!
//! A FIFO of `(handler, argument)` pairs where exactly one entry is "in
//! flight" at a time. The producer is foreground code calling
//! [`Queue::enqueue`]; the consumer is an interrupt handler calling
//! [`Queue::dispatch`] once the in-flight operation has finished.
//!
//! The length counts the in-flight entry too, so a queue of capacity `N`
//! holds one running operation and up to `N - 1` waiting ones.
//!
//! # Inline fast path
//!
//! Enqueueing into an empty queue does not store anything: the handler runs
//! immediately, before `enqueue` returns, with interrupts still masked. A
//! handler that enqueues again from there sees a non-empty queue and
//! appends normally.
//!
//! # Overflow
//!
//! With `WAIT = false` overflow is fatal. With `WAIT = true` the producer
//! spins with interrupts restored until the consumer frees a slot; calling
//! that from a context with interrupts masked never returns.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::sync::Interrupts;

/// An operation the queue runs: receives the owning context and its
/// argument block.
pub type Handler<C, T> = fn(&mut C, &T);

struct Entry<C, T> {
    func: Handler<C, T>,
    args: T,
}

/// Capacity-`N` command queue owned by a context of type `C`.
pub struct Queue<C, T, const N: usize, const WAIT: bool = false> {
    entries: [Option<Entry<C, T>>; N],
    head: usize,
    tail: usize,
    /// Read by foreground spins while the handler side writes it.
    length: AtomicUsize,
}

/// Gives the queue functions access to the queue inside its context.
pub trait QueueHost<Q>: Interrupts {
    fn queue(&mut self) -> &mut Q;
}

impl<C, T, const N: usize, const WAIT: bool> Queue<C, T, N, WAIT> {
    pub const fn new() -> Self {
        const { assert!(N > 0, "queue capacity must be non-zero") };
        Self {
            entries: [const { None }; N],
            head: 0,
            tail: 0,
            length: AtomicUsize::new(0),
        }
    }

    /// In-flight plus waiting entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.length.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop every waiting entry and forget the in-flight one.
    ///
    /// Whatever the in-flight operation was doing is abandoned; its
    /// completion interrupt, if one still arrives, finds an empty queue.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = None;
        }
        self.head = 0;
        self.tail = 0;
        self.length.store(0, Ordering::Release);
    }

    fn push(&mut self, func: Handler<C, T>, args: T) {
        self.entries[self.tail] = Some(Entry { func, args });
        self.tail = (self.tail + 1) % N;
        self.length.store(self.len() + 1, Ordering::Release);
    }

    fn pop(&mut self) -> Option<Entry<C, T>> {
        let entry = self.entries[self.head].take();
        self.head = (self.head + 1) % N;
        entry
    }
}

impl<C, T, const N: usize, const WAIT: bool> Queue<C, T, N, WAIT>
where
    C: QueueHost<Queue<C, T, N, WAIT>>,
{
    /// Run `func(args)` now if the queue is idle, otherwise append it.
    pub fn enqueue(host: &mut C, func: Handler<C, T>, args: T) {
        let irq_was_enabled = host.mask_interrupts();

        loop {
            let length = host.queue().len();

            if length == 0 {
                host.queue().length.store(1, Ordering::Release);
                func(host, &args);
                break;
            }

            if length < N {
                host.queue().push(func, args);
                break;
            }

            host.restore_interrupts(irq_was_enabled);
            if !WAIT {
                panic!("Queue overflow");
            }
            while host.queue().len() >= N {
                host.relax();
            }
            host.mask_interrupts();
        }

        host.restore_interrupts(irq_was_enabled);
    }

    /// Retire the in-flight entry and start the next one.
    ///
    /// Called from the completion interrupt. Returns `true` once the queue
    /// has drained, `false` if another entry was started.
    pub fn dispatch(host: &mut C) -> bool {
        let queue = host.queue();
        let length = queue.len();
        if length == 0 {
            return true;
        }

        let length = length - 1;
        queue.length.store(length, Ordering::Release);
        if length == 0 {
            return true;
        }

        if let Some(Entry { func, args }) = queue.pop() {
            func(host, &args);
        }
        false
    }

    /// Spin until every queued entry has been retired.
    pub fn sync(host: &mut C) {
        while !host.queue().is_empty() {
            host.relax();
        }
    }
}

impl<C, T, const N: usize, const WAIT: bool> Default for Queue<C, T, N, WAIT> {
    fn default() -> Self {
        Self::new()
    }
}
