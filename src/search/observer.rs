//! Observers notified while searches run and while the cache is busy
use crate::search::extractors::DataExtractor;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::BTreeMap;

pub const CACHING_STATUS: &str = "Caching updated drawing...";

/// Receives one call per matching item. Searches call observers from worker
/// threads concurrently, so implementations keep their state behind locks.
pub trait Observer<T>: Send + Sync {
    fn on_match_found(&self, item: &T);
}

/// Collects the extracted content of every match, case-insensitively.
pub struct ContentCollectingObserver<X> {
    extractor: X,
    content: Mutex<BTreeMap<String, String>>,
}

impl<X> ContentCollectingObserver<X> {
    pub fn new(extractor: X) -> Self {
        Self {
            extractor,
            content: Mutex::new(BTreeMap::new()),
        }
    }

    /// Distinct matched content, ordered case-insensitively.
    pub fn matched_content(&self) -> Vec<String> {
        self.content.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.content.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.lock().is_empty()
    }
}

impl<T, X> Observer<T> for ContentCollectingObserver<X>
where
    X: DataExtractor<T>,
{
    fn on_match_found(&self, item: &T) {
        let content = self.extractor.extract(item);
        if content.trim().is_empty() {
            return;
        }
        self.content
            .lock()
            .entry(content.to_lowercase())
            .or_insert(content);
    }
}

/// Turns caching transitions into status text and forwards each change to
/// whoever holds the receiving end, typically a UI thread.
pub struct CachingObserver {
    status: Mutex<String>,
    sender: Sender<String>,
}

impl CachingObserver {
    pub fn new() -> (Self, Receiver<String>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (
            Self {
                status: Mutex::new(String::new()),
                sender,
            },
            receiver,
        )
    }

    pub fn status_message(&self) -> String {
        self.status.lock().clone()
    }
}

impl Observer<bool> for CachingObserver {
    fn on_match_found(&self, is_caching: &bool) {
        let message = if *is_caching { CACHING_STATUS } else { "" };
        *self.status.lock() = message.to_string();
        // Receiver gone means nobody is listening any more.
        let _ = self.sender.send(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::extractors::Extractor;

    #[test]
    fn content_is_deduplicated_ignoring_case() {
        let observer = ContentCollectingObserver::new(Extractor::AssemblyPosition);
        observer.on_match_found(&"B1".to_string());
        observer.on_match_found(&"b1".to_string());
        observer.on_match_found(&"   ".to_string());
        observer.on_match_found(&"C2".to_string());
        assert_eq!(observer.matched_content(), vec!["B1", "C2"]);
    }

    #[test]
    fn caching_observer_publishes_status_changes() {
        let (observer, receiver) = CachingObserver::new();
        observer.on_match_found(&true);
        assert_eq!(observer.status_message(), CACHING_STATUS);
        observer.on_match_found(&false);
        assert_eq!(observer.status_message(), "");
        let messages: Vec<String> = receiver.try_iter().collect();
        assert_eq!(messages, vec![CACHING_STATUS.to_string(), String::new()]);
    }
}
