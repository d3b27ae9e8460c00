//! Bounded, allocation-free buffer pools.
//!
//! Two shapes are used by the controller:
//!
//! - [`SingleShotQueue`] and [`PeriodicSlot`] hold outbound application data
//!   awaiting a send cycle.
//! - [`RecvPool`] holds inbound data: a fixed array of buffers threaded
//!   through three index-only FIFOs (`idle`, `recv`, `ready`), so the
//!   buffers themselves never move or get reallocated — only their index
//!   travels between queues. `0xFF` marks "no index available", mirroring
//!   the sentinel the original buffer pool returns on exhaustion.

use std::collections::VecDeque;
use std::sync::Mutex;

use frame_proto::MAX_DATA;

use crate::error::PoolError;

/// Sentinel returned in place of a valid pool index when none is available.
pub const NONE_INDEX: u8 = 0xFF;

/// An opaque application data record: an id plus a short byte payload.
///
/// This is the bare unit that flows through the send queues before
/// arbitration resolves it into a full [`crate::controller::Command`], and
/// the unit reconstructed from a decoded frame before receive matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Data {
    id: u8,
    bytes: [u8; MAX_DATA],
    len: u8,
}

impl Data {
    /// Build a data record from an id and payload.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PayloadTooLarge`] if `payload` exceeds
    /// [`MAX_DATA`].
    pub fn new(id: u8, payload: &[u8]) -> Result<Self, PoolError> {
        if payload.len() > MAX_DATA {
            return Err(PoolError::PayloadTooLarge { len: payload.len(), max: MAX_DATA });
        }
        let mut bytes = [0u8; MAX_DATA];
        bytes[..payload.len()].copy_from_slice(payload);
        Ok(Self { id, bytes, len: payload.len() as u8 })
    }

    /// The data's id (a send-command id on the outbound path, a
    /// response-command id on the inbound path).
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// The data's payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Rebuild a [`Data`] record from a decoded wire payload, where the
    /// first byte is the command id and the remainder is the payload.
    ///
    /// A one-byte wire (an id with no payload at all) is rejected the same
    /// as an empty one: the receive path only ever matches a reply against
    /// an outstanding command's `resp_id`, and a reply carrying no data
    /// beyond that id is never a legal response.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::EmptyFrame`] if `wire` has no bytes at all, or
    /// [`PoolError::PayloadTooShort`] if `wire.len() <= 1`.
    pub fn from_wire(wire: &[u8]) -> Result<Self, PoolError> {
        if wire.len() <= 1 {
            return if wire.is_empty() {
                Err(PoolError::EmptyFrame)
            } else {
                Err(PoolError::PayloadTooShort { len: wire.len() })
            };
        }
        let (&id, rest) = wire.split_first().ok_or(PoolError::EmptyFrame)?;
        Self::new(id, rest)
    }

    /// Serialize this record back into a single `id || payload` buffer
    /// suitable for handing to [`frame_proto::Encoder::encode`].
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(1 + self.len as usize);
        wire.push(self.id);
        wire.extend_from_slice(self.payload());
        wire
    }
}

/// A bounded FIFO of outbound [`Data`] records, drained one at a time by the
/// controller's arbitration step.
///
/// Capacity is fixed at construction; `push` fails rather than blocking or
/// growing once full, so a caller that floods the queue sees the failure
/// immediately instead of the controller silently falling behind.
pub struct SingleShotQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> SingleShotQueue<T> {
    /// Create an empty queue with the given fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Push a value onto the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::QueueFull`] if the queue is already at capacity.
    pub fn push(&self, value: T) -> Result<(), PoolError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.len() >= self.capacity {
            return Err(PoolError::QueueFull { capacity: self.capacity });
        }
        inner.push_back(value);
        Ok(())
    }

    /// Pop the oldest value, if any.
    pub fn pop(&self) -> Option<T> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pop_front()
    }

    /// Number of values currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single slot holding the current periodic command, latest-wins.
///
/// Unlike [`SingleShotQueue`], setting a new value never fails and simply
/// replaces whatever was there — there is only ever one periodic command in
/// flight, matching the source firmware's single `period_cmd` field.
pub struct PeriodicSlot<T> {
    inner: Mutex<Option<T>>,
}

impl<T: Clone> PeriodicSlot<T> {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    /// Replace the slot's contents.
    pub fn set(&self, value: T) {
        *self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(value);
    }

    /// Read the slot's current contents, if any has ever been set.
    pub fn get(&self) -> Option<T> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

impl<T: Clone> Default for PeriodicSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a wire payload into a [`Data`] record and stage it on `pool`'s
/// `recv` queue, ready for [`RecvPool::pop_recv`] to pick up.
///
/// Exposed as a free function (rather than only a [`RecvPool`] method) so a
/// transport's reader thread can hold just an `Arc<RecvPool>` — never the
/// full controller context, whose transport/timer fields are not meant to
/// be touched from any thread but the one driving the FSM.
///
/// # Errors
///
/// Returns [`PoolError::EmptyFrame`] if `payload` carries no id byte,
/// [`PoolError::PayloadTooShort`] if `payload.len() <= 1` (an id with no
/// payload bytes), or [`PoolError::RecvPoolExhausted`] if every buffer is
/// checked out.
pub fn accept_frame(pool: &RecvPool, payload: &[u8]) -> Result<u8, PoolError> {
    let data = Data::from_wire(payload)?;
    let idx = pool.alloc();
    if idx == NONE_INDEX {
        return Err(PoolError::RecvPoolExhausted);
    }
    pool.populate(idx, data)?;
    Ok(idx)
}

/// Number of receive buffers backing a [`RecvPool`].
pub const RECV_CAP: usize = 4;

/// A single receive buffer slot inside a [`RecvPool`].
#[derive(Debug, Clone, Copy, Default)]
struct RecvBuffer {
    data: Option<Data>,
}

/// A bounded pool of receive buffers threaded through three index queues.
///
/// `idle` holds indices of buffers available for allocation; `recv` holds
/// indices of buffers currently being written to (allocated but not yet
/// complete); `ready` holds indices of buffers holding a complete inbound
/// [`Data`] record awaiting triage by the controller. A buffer's index
/// moves between these queues; the buffer storage itself never moves,
/// so the pool performs no per-message heap allocation.
pub struct RecvPool {
    buffers: Mutex<[RecvBuffer; RECV_CAP]>,
    idle: IndexQueue,
    recv: IndexQueue,
    ready: IndexQueue,
}

impl RecvPool {
    /// Create a pool with every buffer initially idle.
    #[must_use]
    pub fn new() -> Self {
        let idle = IndexQueue::new(RECV_CAP);
        for i in 0..RECV_CAP {
            // Capacity matches RECV_CAP exactly; push cannot fail here.
            let _ = idle.push(i as u8);
        }
        Self {
            buffers: Mutex::new([RecvBuffer::default(); RECV_CAP]),
            idle,
            recv: IndexQueue::new(RECV_CAP),
            ready: IndexQueue::new(RECV_CAP),
        }
    }

    /// Allocate a buffer from the idle queue and move it to `recv`.
    ///
    /// Returns [`NONE_INDEX`] if the pool is exhausted.
    pub fn alloc(&self) -> u8 {
        let Some(idx) = self.idle.pop() else {
            return NONE_INDEX;
        };
        // recv has the same capacity as idle; this push cannot fail.
        let _ = self.recv.push(idx);
        idx
    }

    /// Write a decoded [`Data`] record into the buffer at `idx`, allocated
    /// earlier via [`RecvPool::alloc`]. The index stays on `recv` until the
    /// controller triages it with [`RecvPool::pop_recv`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidIndex`] if `idx` is out of range.
    pub fn populate(&self, idx: u8, data: Data) -> Result<(), PoolError> {
        self.write(idx, data)
    }

    /// Pop the oldest index awaiting triage from `recv`, if any.
    ///
    /// Indices come off in the same order they were allocated in, which
    /// matches the order their `RecvData` wake-ups were posted, so no
    /// explicit index needs to travel with the message itself.
    pub fn pop_recv(&self) -> Option<u8> {
        self.recv.pop()
    }

    /// A triaged buffer matched the outstanding command: move it onto
    /// `ready` for the caller to read and free.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidIndex`] if `idx` is out of range.
    pub fn promote_ready(&self, idx: u8) -> Result<(), PoolError> {
        if (idx as usize) >= RECV_CAP {
            return Err(PoolError::InvalidIndex { index: idx });
        }
        // ready has the same capacity as recv; this push cannot fail.
        let _ = self.ready.push(idx);
        Ok(())
    }

    /// A triaged buffer did not match anything outstanding: clear it and
    /// return it straight to `idle` without ever visiting `ready`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidIndex`] if `idx` is out of range.
    pub fn discard(&self, idx: u8) -> Result<(), PoolError> {
        self.free(idx)
    }

    /// Pop the oldest ready buffer's index, if any.
    pub fn pop_ready(&self) -> Option<u8> {
        self.ready.pop()
    }

    /// Read the data stored at `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidIndex`] if `idx` is out of range or the
    /// slot holds no data.
    pub fn read(&self, idx: u8) -> Result<Data, PoolError> {
        let buffers = self.buffers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        buffers
            .get(idx as usize)
            .and_then(|buf| buf.data)
            .ok_or(PoolError::InvalidIndex { index: idx })
    }

    /// Return a buffer to the idle queue, clearing its contents.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidIndex`] if `idx` is out of range.
    pub fn free(&self, idx: u8) -> Result<(), PoolError> {
        {
            let mut buffers = self.buffers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let buf = buffers.get_mut(idx as usize).ok_or(PoolError::InvalidIndex { index: idx })?;
            buf.data = None;
        }
        // idle has the same capacity as the pool; this push cannot fail
        // as long as every index is freed at most once between allocs.
        let _ = self.idle.push(idx);
        Ok(())
    }

    fn write(&self, idx: u8, data: Data) -> Result<(), PoolError> {
        let mut buffers = self.buffers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let buf = buffers.get_mut(idx as usize).ok_or(PoolError::InvalidIndex { index: idx })?;
        buf.data = Some(data);
        Ok(())
    }
}

impl Default for RecvPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A bounded FIFO of raw `u8` indices, the building block behind
/// [`RecvPool`]'s three queues.
struct IndexQueue {
    inner: Mutex<VecDeque<u8>>,
    capacity: usize,
}

impl IndexQueue {
    fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    fn push(&self, idx: u8) -> Result<(), PoolError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.len() >= self.capacity {
            return Err(PoolError::PoolExhausted { capacity: self.capacity });
        }
        inner.push_back(idx);
        Ok(())
    }

    fn pop(&self) -> Option<u8> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_rejects_oversize_payload() {
        let payload = vec![0u8; MAX_DATA + 1];
        assert_eq!(
            Data::new(0x04, &payload),
            Err(PoolError::PayloadTooLarge { len: MAX_DATA + 1, max: MAX_DATA })
        );
    }

    #[test]
    fn data_round_trips_id_and_payload() {
        let data = Data::new(0x04, &[1, 2, 3]).unwrap();
        assert_eq!(data.id(), 0x04);
        assert_eq!(data.payload(), &[1, 2, 3]);
    }

    #[test]
    fn from_wire_rejects_empty_and_single_byte_payloads() {
        assert_eq!(Data::from_wire(&[]), Err(PoolError::EmptyFrame));
        assert_eq!(Data::from_wire(&[0x04]), Err(PoolError::PayloadTooShort { len: 1 }));
        let data = Data::from_wire(&[0x04, 0xAA]).unwrap();
        assert_eq!(data.id(), 0x04);
        assert_eq!(data.payload(), &[0xAA]);
    }

    #[test]
    fn single_shot_queue_is_fifo_and_bounded() {
        let q: SingleShotQueue<u8> = SingleShotQueue::new(2);
        assert!(q.push(1).is_ok());
        assert!(q.push(2).is_ok());
        assert_eq!(q.push(3), Err(PoolError::QueueFull { capacity: 2 }));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn periodic_slot_is_latest_wins() {
        let slot: PeriodicSlot<u8> = PeriodicSlot::new();
        assert_eq!(slot.get(), None);
        slot.set(1);
        slot.set(2);
        assert_eq!(slot.get(), Some(2));
    }

    #[test]
    fn recv_pool_alloc_complete_pop_free_cycle() {
        let pool = RecvPool::new();
        let idx = pool.alloc();
        assert_ne!(idx, NONE_INDEX);

        let data = Data::new(0x05, &[0xAA]).unwrap();
        pool.populate(idx, data).unwrap();

        let recv_idx = pool.pop_recv().unwrap();
        assert_eq!(recv_idx, idx);
        pool.promote_ready(recv_idx).unwrap();

        let ready = pool.pop_ready().unwrap();
        assert_eq!(ready, idx);
        assert_eq!(pool.read(ready).unwrap(), data);

        pool.free(ready).unwrap();
        // Every buffer should be back in idle: RECV_CAP allocs must all succeed.
        let mut seen = Vec::new();
        for _ in 0..RECV_CAP {
            let i = pool.alloc();
            assert_ne!(i, NONE_INDEX);
            seen.push(i);
        }
        assert_eq!(pool.alloc(), NONE_INDEX);
        for i in seen {
            pool.free(i).unwrap();
        }
    }

    #[test]
    fn recv_pool_exhaustion_returns_sentinel() {
        let pool = RecvPool::new();
        let mut indices = Vec::new();
        for _ in 0..RECV_CAP {
            indices.push(pool.alloc());
        }
        assert_eq!(pool.alloc(), NONE_INDEX);
        assert!(indices.iter().all(|&i| i != NONE_INDEX));
    }

    #[test]
    fn discarded_buffer_returns_to_idle_without_visiting_ready() {
        let pool = RecvPool::new();
        let idx = pool.alloc();
        pool.populate(idx, Data::new(0x99, &[]).unwrap()).unwrap();
        let recv_idx = pool.pop_recv().unwrap();
        pool.discard(recv_idx).unwrap();

        assert_eq!(pool.pop_ready(), None);
        let mut seen = 0;
        for _ in 0..RECV_CAP {
            if pool.alloc() != NONE_INDEX {
                seen += 1;
            }
        }
        assert_eq!(seen, RECV_CAP);
    }

    #[test]
    fn read_of_unallocated_index_is_invalid() {
        let pool = RecvPool::new();
        assert_eq!(pool.read(0), Err(PoolError::InvalidIndex { index: 0 }));
    }
}
