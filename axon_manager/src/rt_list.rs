//! Double-buffered controller list.
//!
//! Two list generations exist at all times. The RT thread reads the
//! published one each cycle without taking any structural lock; service
//! threads edit the other one and then atomically flip which is
//! published. A writer never touches the generation the RT thread is
//! holding: it waits with bounded sleeps until the RT reader has moved
//! off, and gives up after a deadline instead of stalling forever.
//!
//! Structural edits (load, unload, switch staging) serialize on a
//! reentrant mutex the RT thread never takes.

use crate::record::ControllerRecord;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

/// Interval between polls while waiting for the RT reader to move off a
/// generation.
const WRITE_POLL_INTERVAL: Duration = Duration::from_micros(200);

/// The RT reader stayed on the target generation past the deadline.
#[derive(Debug, Clone, Error)]
#[error("timed out waiting for the real-time thread to release a list generation")]
pub struct ListWriteTimeout;

/// Double-buffered list of loaded controllers.
pub struct RtControllerList {
    slots: [RwLock<Vec<ControllerRecord>>; 2],
    /// Index of the generation RT readers should pick up.
    published: AtomicUsize,
    /// Generation currently held by the RT reader, or -1.
    used_by_rt: AtomicIsize,
    structural: ReentrantMutex<()>,
}

impl RtControllerList {
    /// Two empty generations, generation 0 published.
    pub fn new() -> Self {
        Self {
            slots: [RwLock::new(Vec::new()), RwLock::new(Vec::new())],
            published: AtomicUsize::new(0),
            used_by_rt: AtomicIsize::new(-1),
            structural: ReentrantMutex::new(()),
        }
    }

    /// Serialize a structural edit. Reentrant so composite operations can
    /// call locked helpers.
    pub fn structural_lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.structural.lock()
    }

    /// Snapshot of the published generation for a non-RT reader.
    pub fn updated_view(&self) -> RwLockReadGuard<'_, Vec<ControllerRecord>> {
        self.slots[self.published.load(Ordering::Acquire)].read()
    }

    /// Acquire the published generation for the RT cycle.
    ///
    /// Marks the generation as in use so writers stay away; the marker
    /// clears when the view drops. Must only be called from the single
    /// RT thread.
    pub fn rt_view(&self) -> RtView<'_> {
        let index = self.published.load(Ordering::Acquire);
        self.used_by_rt.store(index as isize, Ordering::SeqCst);
        RtView {
            list: self,
            guard: self.slots[index].read(),
        }
    }

    /// Acquire the unpublished generation for editing, pre-filled with a
    /// copy of the published one.
    ///
    /// Waits for the RT reader to move off the target generation first.
    ///
    /// # Errors
    /// [`ListWriteTimeout`] if the RT reader stays on the target past
    /// `timeout`.
    pub fn write_view<'a>(
        &'a self,
        _structural: &ReentrantMutexGuard<'a, ()>,
        timeout: Duration,
    ) -> Result<WriteView<'a>, ListWriteTimeout> {
        let target = 1 - self.published.load(Ordering::Acquire);
        let deadline = Instant::now() + timeout;
        while self.used_by_rt.load(Ordering::SeqCst) == target as isize {
            if Instant::now() >= deadline {
                return Err(ListWriteTimeout);
            }
            std::thread::sleep(WRITE_POLL_INTERVAL);
        }
        trace!(generation = target, "acquired list generation for writing");

        let mut guard = self.slots[target].write();
        guard.clear();
        guard.extend(self.updated_view().iter().cloned());
        Ok(WriteView {
            list: self,
            index: target,
            guard,
        })
    }
}

impl Default for RtControllerList {
    fn default() -> Self {
        Self::new()
    }
}

/// RT-side read handle on the published generation.
pub struct RtView<'a> {
    list: &'a RtControllerList,
    guard: RwLockReadGuard<'a, Vec<ControllerRecord>>,
}

impl std::ops::Deref for RtView<'_> {
    type Target = [ControllerRecord];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl Drop for RtView<'_> {
    fn drop(&mut self) {
        self.list.used_by_rt.store(-1, Ordering::SeqCst);
    }
}

/// Writer-side handle on the unpublished generation.
pub struct WriteView<'a> {
    list: &'a RtControllerList,
    index: usize,
    guard: RwLockWriteGuard<'a, Vec<ControllerRecord>>,
}

impl WriteView<'_> {
    /// Flip this generation to published. RT readers pick it up on their
    /// next cycle.
    pub fn publish(self) {
        let WriteView { list, index, guard } = self;
        drop(guard);
        list.published.store(index, Ordering::Release);
        trace!(generation = index, "published list generation");
    }
}

impl std::ops::Deref for WriteView<'_> {
    type Target = Vec<ControllerRecord>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl std::ops::DerefMut for WriteView<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ControllerCell;
    use axon_common::backend::InterfaceAccess;
    use axon_common::controller::{Controller, ControllerError, ControllerInfo};
    use axon_common::interface::InterfaceHandle;

    struct Noop;

    impl Controller for Noop {
        fn command_interface_claims(&self) -> Vec<String> {
            Vec::new()
        }

        fn on_start(
            &mut self,
            _commands: Vec<InterfaceHandle>,
            _states: Vec<InterfaceHandle>,
        ) -> Result<(), ControllerError> {
            Ok(())
        }

        fn update(&mut self, _io: &mut dyn InterfaceAccess, _dt: std::time::Duration) {}
    }

    fn record(name: &str) -> ControllerRecord {
        ControllerCell::new(
            ControllerInfo {
                name: name.to_string(),
                type_name: "noop".to_string(),
            },
            Box::new(Noop),
        )
    }

    #[test]
    fn published_edits_become_visible_after_publish() {
        let list = RtControllerList::new();
        let lock = list.structural_lock();

        let mut view = list.write_view(&lock, Duration::from_millis(50)).unwrap();
        view.push(record("a"));
        assert!(list.updated_view().is_empty());
        view.publish();

        assert_eq!(list.updated_view().len(), 1);
        assert_eq!(list.rt_view()[0].name(), "a");
    }

    #[test]
    fn write_view_starts_from_the_published_generation() {
        let list = RtControllerList::new();
        let lock = list.structural_lock();

        let mut view = list.write_view(&lock, Duration::from_millis(50)).unwrap();
        view.push(record("a"));
        view.publish();

        let mut view = list.write_view(&lock, Duration::from_millis(50)).unwrap();
        assert_eq!(view.len(), 1);
        view.push(record("b"));
        view.publish();

        let names: Vec<_> = list.updated_view().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn writer_times_out_while_rt_holds_the_target_generation() {
        let list = RtControllerList::new();

        // RT pinned on generation 0; generation 1 is free, so the first
        // write succeeds and publishes generation 1.
        let rt = list.rt_view();
        let lock = list.structural_lock();
        list.write_view(&lock, Duration::from_millis(20)).unwrap().publish();

        // Now the writer targets generation 0, which RT still holds.
        let err = list.write_view(&lock, Duration::from_millis(20));
        assert!(err.is_err());

        drop(rt);
        assert!(list.write_view(&lock, Duration::from_millis(20)).is_ok());
    }

    #[test]
    fn rt_view_releases_its_generation_on_drop() {
        let list = RtControllerList::new();
        {
            let _rt = list.rt_view();
            assert_eq!(list.used_by_rt.load(Ordering::SeqCst), 0);
        }
        assert_eq!(list.used_by_rt.load(Ordering::SeqCst), -1);
    }
}
