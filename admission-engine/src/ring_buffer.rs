use std::num::NonZeroUsize;

/// A fixed-capacity FIFO queue.
///
/// Storage is allocated once at construction: a boxed slice of slots, a head
/// index and a logical length. Pushing never reallocates and popping clears the
/// vacated slot. Callers needing shared access wrap it in a lock; none of the
/// operations here are atomic.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: (0..capacity.get()).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Appends `value` at the back.
    ///
    /// # Errors
    ///
    /// Hands `value` back if the buffer is full.
    pub fn push_back(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        let tail = self.wrap(self.head + self.len);
        self.slots[tail] = Some(value);
        self.len += 1;
        Ok(())
    }

    /// Removes the oldest element, or `None` if the buffer is empty.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = self.wrap(self.head + 1);
        self.len -= 1;
        value
    }

    pub fn peek_front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    pub fn peek_back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.wrap(self.head + self.len - 1)].as_ref()
    }

    #[inline]
    fn wrap(&self, index: usize) -> usize {
        index % self.slots.len()
    }
}
