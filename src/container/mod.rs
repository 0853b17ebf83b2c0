//! Marshalling containers.
//!
//! # Data Flow
//! ```text
//! caller builds MgmtList<T> (enqueue)
//!     → embedded in a Rule (volumes, parents, DNS servers, ...)
//!     → or sent as a batch payload (record names, lookups)
//!     → receiver reads by position (cursor) or takes ownership (dequeue/drain)
//! ```
//!
//! # Design Decisions
//! - FIFO semantics kept for `enqueue`/`dequeue`
//! - Reading never consumes: `cursor()` walks by index and can peek/seek
//! - Ownership transfer is explicit (`dequeue`, `take_at`, `drain`)

pub mod elements;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{MgmtError, MgmtResult};

pub use elements::{Domain, IpAddrEle, PortEle};

/// Ordered FIFO container used to move collections across the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MgmtList<T> {
    items: VecDeque<T>,
}

pub type StringList = MgmtList<String>;
pub type IntList = MgmtList<i32>;
pub type DomainList = MgmtList<Domain>;
pub type IpAddrList = MgmtList<IpAddrEle>;
pub type PortList = MgmtList<PortEle>;

impl<T> Default for MgmtList<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> MgmtList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail.
    pub fn enqueue(&mut self, value: T) {
        self.items.push_back(value);
    }

    /// Remove the head and hand ownership to the caller.
    pub fn dequeue(&mut self) -> MgmtResult<T> {
        self.items.pop_front().ok_or(MgmtError::EmptyList)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index` without consuming it.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Index cursor positioned at the head.
    pub fn cursor(&self) -> Cursor<'_, T> {
        Cursor { list: self, pos: 0 }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Remove and return the element at `index`.
    pub fn take_at(&mut self, index: usize) -> MgmtResult<T> {
        let count = self.items.len();
        self.items
            .remove(index)
            .ok_or(MgmtError::Index { index, count })
    }

    /// Take every element in order, leaving the list empty.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    /// Release all remaining elements.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> FromIterator<T> for MgmtList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> Extend<T> for MgmtList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<T> IntoIterator for MgmtList<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a MgmtList<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> From<Vec<T>> for MgmtList<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

/// Non-consuming, index-based walk over a [`MgmtList`].
#[derive(Debug)]
pub struct Cursor<'a, T> {
    list: &'a MgmtList<T>,
    pos: usize,
}

impl<'a, T> Cursor<'a, T> {
    /// Element under the cursor, if any.
    pub fn peek(&self) -> Option<&'a T> {
        self.list.get(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to an absolute position. Positions past the end are clamped.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.list.len());
    }

    pub fn remaining(&self) -> usize {
        self.list.len() - self.pos
    }
}

impl<'a, T> Iterator for Cursor<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.list.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}
