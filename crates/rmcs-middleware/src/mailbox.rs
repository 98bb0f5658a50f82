//! Coalescing mailbox.
//!
//! A [`Mailbox`] holds at most one pending item per kind. Putting an item
//! whose kind is already pending discards the older one and appends the new
//! one at the tail, so a slow consumer always sees the latest value of every
//! kind and never a backlog of stale ones.
//!
//! | Operation | Behaviour |
//! |---|---|
//! | [`Mailbox::put`] | Replace any pending item of the same kind, append |
//! | [`Mailbox::put_all`] | Same for a batch; rejects batches with repeated kinds |
//! | [`Mailbox::take`] | Block until an item is available or the mailbox is interrupted |
//! | [`Mailbox::try_take`] | Non-blocking variant |

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use rmcs_types::{Channel, ControlSample, DataKind, Payload, RmcsError};

use crate::shutdown::Interruptible;

/// Items that can live in a [`Mailbox`]: each one belongs to exactly one kind.
pub trait Keyed {
    type Key: Copy + Eq + Debug + Into<DataKind>;

    fn key(&self) -> Self::Key;
}

impl Keyed for Payload {
    type Key = DataKind;

    fn key(&self) -> DataKind {
        self.kind()
    }
}

impl Keyed for ControlSample {
    type Key = Channel;

    fn key(&self) -> Channel {
        self.channel()
    }
}

struct State<T> {
    items: VecDeque<T>,
    interrupted: bool,
}

/// Thread-safe coalescing queue. Share it behind an `Arc`.
pub struct Mailbox<T: Keyed> {
    state: Mutex<State<T>>,
    available: Condvar,
}

impl<T: Keyed> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                interrupted: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `item`, dropping any pending item of the same kind. Fails
    /// only once the mailbox has been interrupted.
    pub fn put(&self, item: T) -> Result<(), RmcsError> {
        let key = item.key();
        let mut state = self.lock();
        if state.interrupted {
            return Err(RmcsError::Interrupted);
        }
        state.items.retain(|pending| pending.key() != key);
        state.items.push_back(item);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Insert a batch atomically.
    ///
    /// A batch carrying two items of the same kind is rejected as a whole
    /// with [`RmcsError::DuplicateKind`] and the mailbox is left unchanged.
    /// Otherwise every pending item sharing a kind with the batch is dropped
    /// and the batch is appended in its own order.
    pub fn put_all(&self, batch: Vec<T>) -> Result<(), RmcsError> {
        let keys: Vec<T::Key> = batch.iter().map(Keyed::key).collect();
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(RmcsError::DuplicateKind((*key).into()));
            }
        }
        if batch.is_empty() {
            return Ok(());
        }

        let mut state = self.lock();
        if state.interrupted {
            return Err(RmcsError::Interrupted);
        }
        state.items.retain(|pending| !keys.contains(&pending.key()));
        state.items.extend(batch);
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    /// Remove and return the oldest item, blocking while the mailbox is
    /// empty. Returns [`RmcsError::Interrupted`] once [`interrupt`] has been
    /// called.
    ///
    /// [`interrupt`]: Mailbox::interrupt
    pub fn take(&self) -> Result<T, RmcsError> {
        let mut state = self.lock();
        loop {
            if state.interrupted {
                return Err(RmcsError::Interrupted);
            }
            if let Some(item) = state.items.pop_front() {
                return Ok(item);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn try_take(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Kinds currently pending, oldest first.
    pub fn kinds(&self) -> Vec<T::Key> {
        self.lock().items.iter().map(Keyed::key).collect()
    }

    /// Wake every blocked `take` and make all further ones fail.
    pub fn interrupt(&self) {
        self.lock().interrupted = true;
        self.available.notify_all();
    }
}

impl<T: Keyed> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed + Send> Interruptible for Mailbox<T> {
    fn interrupt(&self) {
        Mailbox::interrupt(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcs_types::{CameraSample, DriveSample, LightSample, SensorKind, SensorSample};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn drive(acc: i32) -> ControlSample {
        ControlSample::Drive(DriveSample::new(acc, 0, false))
    }

    fn camera(yaw: i32) -> ControlSample {
        ControlSample::Camera(CameraSample::new(yaw, 0))
    }

    fn light() -> ControlSample {
        ControlSample::Light(LightSample::default())
    }

    #[test]
    fn put_replaces_pending_item_of_same_kind() {
        let mb = Mailbox::new();
        mb.put(drive(1)).unwrap();
        mb.put(light()).unwrap();
        mb.put(drive(2)).unwrap();

        assert_eq!(mb.len(), 2);
        assert_eq!(mb.kinds(), vec![Channel::Light, Channel::Drive]);
        assert_eq!(mb.take().unwrap(), light());
        assert_eq!(mb.take().unwrap(), drive(2));
    }

    #[test]
    fn batch_with_repeated_kind_is_rejected_without_side_effects() {
        let mb = Mailbox::new();
        mb.put(light()).unwrap();

        let err = mb.put_all(vec![camera(1), drive(0), camera(3)]).unwrap_err();
        assert_eq!(err, RmcsError::DuplicateKind(DataKind::Control(Channel::Camera)));
        assert_eq!(mb.kinds(), vec![Channel::Light]);
    }

    #[test]
    fn batch_coalesces_against_pending_items() {
        let mb = Mailbox::new();
        mb.put(drive(1)).unwrap();
        mb.put(light()).unwrap();

        mb.put_all(vec![camera(9), drive(7)]).unwrap();

        assert_eq!(mb.kinds(), vec![Channel::Light, Channel::Camera, Channel::Drive]);
        assert_eq!(mb.try_take(), Some(light()));
        assert_eq!(mb.try_take(), Some(camera(9)));
        assert_eq!(mb.try_take(), Some(drive(7)));
        assert!(mb.is_empty());
    }

    #[test]
    fn payload_mailbox_keys_sensors_by_kind() {
        let mb: Mailbox<Payload> = Mailbox::new();
        mb.put(SensorSample::new(SensorKind::FrontDistance, 10).into()).unwrap();
        mb.put(SensorSample::new(SensorKind::WheelSpeed, 3).into()).unwrap();
        mb.put(SensorSample::new(SensorKind::FrontDistance, 12).into()).unwrap();
        mb.put(drive(4).into()).unwrap();

        assert_eq!(mb.len(), 3);
        match mb.take().unwrap() {
            Payload::Sensor(s) => assert_eq!(s.kind, SensorKind::WheelSpeed),
            other => panic!("unexpected {other:?}"),
        }
        match mb.take().unwrap() {
            Payload::Sensor(s) => assert_eq!(s.value, 12),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn take_blocks_until_put() {
        let mb = Arc::new(Mailbox::new());
        let producer = mb.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.put(camera(3)).unwrap();
        });

        assert_eq!(mb.take().unwrap(), camera(3));
        handle.join().unwrap();
    }

    #[test]
    fn interrupt_wakes_blocked_take() {
        let mb: Arc<Mailbox<ControlSample>> = Arc::new(Mailbox::new());
        let consumer = mb.clone();
        let handle = thread::spawn(move || consumer.take());

        thread::sleep(Duration::from_millis(20));
        mb.interrupt();

        assert_eq!(handle.join().unwrap(), Err(RmcsError::Interrupted));
        assert_eq!(mb.put(drive(1)), Err(RmcsError::Interrupted));
    }
}
