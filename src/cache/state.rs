//! Caching lifecycle shared by the cache and every search executor
use crate::search::observer::Observer;
use log::debug;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Caching,
    Ready,
    Dirty,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheState::Uninitialized => write!(f, "uninitialized"),
            CacheState::Caching => write!(f, "caching"),
            CacheState::Ready => write!(f, "ready"),
            CacheState::Dirty => write!(f, "dirty"),
        }
    }
}

/// Tracks [`CacheState`] and tells subscribers when caching starts (`true`)
/// and stops (`false`).
pub struct CacheStateManager {
    state: Mutex<CacheState>,
    observers: Mutex<Vec<Arc<dyn Observer<bool>>>>,
}

impl CacheStateManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState::Uninitialized),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> CacheState {
        *self.state.lock()
    }

    pub fn is_caching(&self) -> bool {
        self.state() == CacheState::Caching
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer<bool>>) {
        self.observers.lock().push(observer);
    }

    pub fn unsubscribe(&self, observer: &Arc<dyn Observer<bool>>) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| !std::ptr::addr_eq(Arc::as_ptr(o), Arc::as_ptr(observer)));
        observers.len() != before
    }

    /// Ready -> Dirty. Any other state is left alone.
    pub fn mark_dirty(&self) -> bool {
        let mut state = self.state.lock();
        if *state == CacheState::Ready {
            *state = CacheState::Dirty;
            true
        } else {
            false
        }
    }

    /// Enters `Caching`. The returned guard moves to `Ready` on
    /// [`CachingGuard::finish`], or restores the previous state when dropped
    /// unfinished.
    pub fn begin_caching(&self) -> CachingGuard<'_> {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            *state = CacheState::Caching;
            previous
        };
        debug!("Cache state {previous} -> caching");
        if previous != CacheState::Caching {
            self.notify(true);
        }
        CachingGuard {
            manager: self,
            previous,
            finished: false,
        }
    }

    fn leave_caching(&self, next: CacheState) {
        *self.state.lock() = next;
        debug!("Cache state caching -> {next}");
        self.notify(false);
    }

    fn notify(&self, is_caching: bool) {
        let observers = self.observers.lock().clone();
        for observer in observers {
            observer.on_match_found(&is_caching);
        }
    }
}

impl Default for CacheStateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use = "dropping the guard immediately ends the caching phase"]
pub struct CachingGuard<'a> {
    manager: &'a CacheStateManager,
    previous: CacheState,
    finished: bool,
}

impl CachingGuard<'_> {
    pub fn finish(mut self) {
        self.finished = true;
        self.manager.leave_caching(CacheState::Ready);
    }
}

impl Drop for CachingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let restored = match self.previous {
                CacheState::Caching => CacheState::Dirty,
                other => other,
            };
            self.manager.leave_caching(restored);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<bool>>);

    impl Observer<bool> for Recorder {
        fn on_match_found(&self, item: &bool) {
            self.0.lock().push(*item);
        }
    }

    #[test]
    fn successful_caching_ends_ready() {
        let manager = CacheStateManager::new();
        let recorder = Arc::new(Recorder::default());
        manager.subscribe(recorder.clone());

        let guard = manager.begin_caching();
        assert!(manager.is_caching());
        guard.finish();

        assert_eq!(manager.state(), CacheState::Ready);
        assert_eq!(*recorder.0.lock(), vec![true, false]);
    }

    #[test]
    fn abandoned_caching_restores_previous_state() {
        let manager = CacheStateManager::new();
        {
            let _guard = manager.begin_caching();
        }
        assert_eq!(manager.state(), CacheState::Uninitialized);
    }

    #[test]
    fn dirty_only_from_ready() {
        let manager = CacheStateManager::new();
        assert!(!manager.mark_dirty());
        manager.begin_caching().finish();
        assert!(manager.mark_dirty());
        assert_eq!(manager.state(), CacheState::Dirty);
    }

    #[test]
    fn unsubscribed_observers_stop_hearing_transitions() {
        let manager = CacheStateManager::new();
        let recorder = Arc::new(Recorder::default());
        let handle: Arc<dyn Observer<bool>> = recorder.clone();
        manager.subscribe(handle.clone());
        assert!(manager.unsubscribe(&handle));
        manager.begin_caching().finish();
        assert!(recorder.0.lock().is_empty());
    }
}
