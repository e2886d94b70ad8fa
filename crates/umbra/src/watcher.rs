//! Mutation notifications and the queue that feeds them to the engine.
//!
//! A document observer delivers batches of [`MutationRecord`]s. Each batch
//! is one message: the engine processes it in a single
//! [`handle_mutations`](crate::engine::InversionEngine::handle_mutations)
//! call, so a batch is never half-applied. Hosts whose observer callback can
//! fire while the engine is busy push batches into a [`MutationQueue`] and
//! drain it once the engine is free.

use std::collections::VecDeque;

use tracing::trace;

use crate::dom::Document;
use crate::engine::InversionEngine;
use crate::storage::KeyValueStore;

/// Attribute whose changes can move an element in or out of a dynamic context.
pub const CLASS_ATTRIBUTE: &str = "class";

/// One observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord<E> {
    /// Children were inserted under and/or removed from `target`.
    ChildList {
        target: E,
        added: Vec<E>,
        removed: Vec<E>,
    },
    /// An attribute of `target` changed.
    Attributes { target: E, name: String },
}

impl<E> MutationRecord<E> {
    /// Insertion of `added` under `target`.
    pub fn added(target: E, added: Vec<E>) -> Self {
        Self::ChildList {
            target,
            added,
            removed: Vec::new(),
        }
    }

    /// Removal of `removed` from `target`.
    pub fn removed(target: E, removed: Vec<E>) -> Self {
        Self::ChildList {
            target,
            added: Vec::new(),
            removed,
        }
    }

    /// A `class` attribute change on `target`.
    pub fn class_changed(target: E) -> Self {
        Self::Attributes {
            target,
            name: CLASS_ATTRIBUTE.to_string(),
        }
    }
}

/// What an observer watches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
    /// Attribute names to report; empty means no attribute records.
    pub attribute_filter: Vec<String>,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            child_list: true,
            subtree: true,
            attribute_filter: vec![CLASS_ATTRIBUTE.to_string()],
        }
    }
}

impl ObserveOptions {
    /// Returns true if attribute records are wanted at all.
    pub fn attributes(&self) -> bool {
        !self.attribute_filter.is_empty()
    }
}

/// FIFO of pending mutation batches.
#[derive(Debug)]
pub struct MutationQueue<E> {
    batches: VecDeque<Vec<MutationRecord<E>>>,
}

impl<E> Default for MutationQueue<E> {
    fn default() -> Self {
        Self {
            batches: VecDeque::new(),
        }
    }
}

impl<E> MutationQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a batch. Empty batches are dropped.
    pub fn push(&mut self, batch: Vec<MutationRecord<E>>) {
        if !batch.is_empty() {
            self.batches.push_back(batch);
        }
    }

    /// Number of batches waiting.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Take the oldest batch.
    pub fn pop(&mut self) -> Option<Vec<MutationRecord<E>>> {
        self.batches.pop_front()
    }

    /// Hand every pending batch to `engine`, oldest first.
    ///
    /// Returns the number of batches processed.
    pub fn drain<D, S>(&mut self, engine: &mut InversionEngine<D, S>) -> usize
    where
        D: Document<Element = E>,
        S: KeyValueStore,
    {
        let mut processed = 0;
        while let Some(batch) = self.batches.pop_front() {
            engine.handle_mutations(&batch);
            processed += 1;
        }
        if processed > 0 {
            trace!(umbra.batches = processed, "mutation queue drained");
        }
        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_watch_class_only() {
        let opts = ObserveOptions::default();
        assert!(opts.child_list);
        assert!(opts.subtree);
        assert!(opts.attributes());
        assert_eq!(opts.attribute_filter, vec!["class".to_string()]);
    }

    #[test]
    fn test_queue_is_fifo_and_skips_empty() {
        let mut q: MutationQueue<u32> = MutationQueue::new();
        q.push(Vec::new());
        assert!(q.is_empty());

        q.push(vec![MutationRecord::class_changed(1)]);
        q.push(vec![MutationRecord::added(0, vec![2, 3])]);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(vec![MutationRecord::class_changed(1)]));
        assert_eq!(q.pop(), Some(vec![MutationRecord::added(0, vec![2, 3])]));
        assert_eq!(q.pop(), None);
    }
}
