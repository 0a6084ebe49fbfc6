//! Stable fragment id assignment.
//!
//! Ids have the form `"{source}:{page}:{sequence}"`, where `sequence` is
//! the fragment's 0-based position among fragments sharing the same
//! `(source, page)`. The assignment depends only on input order and
//! provenance, not on wall-clock time, randomness, or prior store
//! state, so re-chunking the same corpus with the same parameters
//! reproduces identical ids. Re-ingestion therefore never duplicates
//! entries.

use crate::models::Fragment;

/// Assign sequence numbers and ids to fragments in input order.
///
/// Scans the slice once, keeping a running `(source, page)` key: when the
/// key changes the counter resets to 0, otherwise it increments. An empty
/// slice is a no-op.
pub fn assign_ids(fragments: &mut [Fragment]) {
    let mut last_key: Option<(String, u32)> = None;
    let mut counter: u32 = 0;

    for fragment in fragments.iter_mut() {
        let key = (fragment.source.clone(), fragment.page);
        match &last_key {
            Some(prev) if *prev == key => counter += 1,
            _ => counter = 0,
        }

        fragment.sequence = counter;
        fragment.id = format!("{}:{}:{}", fragment.source, fragment.page, counter);
        last_key = Some(key);
    }
}
