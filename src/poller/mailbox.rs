use std::sync::{Arc, Mutex};

use super::lock_unpoisoned;

/// Single-slot handoff from a worker thread to the application loop.
///
/// Posting overwrites any unread value; only the newest result matters.
/// `take` moves the value out, so no two readers can receive the same item.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Stores `value`, returning `true` if an unread value was replaced.
    pub fn post(&self, value: T) -> bool {
        lock_unpoisoned(&self.slot).replace(value).is_some()
    }

    /// Non-blocking read that empties the slot.
    pub fn take(&self) -> Option<T> {
        lock_unpoisoned(&self.slot).take()
    }

    pub fn has_pending(&self) -> bool {
        lock_unpoisoned(&self.slot).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_post_overwrites_unread_value() {
        let mailbox = Mailbox::new();

        assert!(!mailbox.post(1));
        assert!(mailbox.post(2));

        assert_eq!(mailbox.take(), Some(2));
        assert_eq!(mailbox.take(), None);
        assert!(!mailbox.has_pending());
    }

    #[test]
    fn test_each_item_is_taken_once() {
        let mailbox = Mailbox::new();
        mailbox.post(String::from("release"));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let mailbox = mailbox.clone();
                thread::spawn(move || mailbox.take())
            })
            .collect();

        let received: Vec<String> = readers
            .into_iter()
            .filter_map(|reader| reader.join().ok().flatten())
            .collect();

        assert_eq!(received, vec![String::from("release")]);
    }
}
