//! Round-robin host selection.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

/// Yields the next candidate host for a connection attempt.
///
/// The cursor is shared by every connection built against the same selector,
/// so host selection across an application's many connections approximates
/// round-robin load distribution rather than pure independent randomness.
/// The first pick is seeded with a random index rather than zero, so a fleet
/// of processes starting at once does not converge on the same host.
///
/// The cursor lock is only ever held for the index update, never across I/O,
/// so concurrent connection attempts are not serialized.
#[derive(Debug, Default)]
pub struct HostSelector {
    cursor: Mutex<Option<usize>>,
}

impl HostSelector {
    /// Create an independent selector with an unseeded cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide shared selector.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<HostSelector>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Pick the next host from the candidate set's stable iteration order.
    ///
    /// Returns `None` for an empty set. The set's lexicographic order keeps
    /// the cursor's meaning stable across calls even when the set was
    /// rebuilt by an independent resolver run.
    pub fn next<'a>(&self, candidates: &'a BTreeSet<String>) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }

        let mut cursor = self.cursor.lock();
        let mut index = match *cursor {
            None => rand::thread_rng().gen_range(0..candidates.len()),
            Some(current) => current + 1,
        };
        if index >= candidates.len() {
            index = 0;
        }
        *cursor = Some(index);
        drop(cursor);

        candidates.iter().nth(index).map(String::as_str)
    }
}
