//! An ordered set on a plain binary search tree that keeps itself roughly balanced by
//! occasionally flattening the whole tree and rebuilding it around medians, instead of rotating
//! on every insert.
//!
//! ```
//! use rebuildset::{Error, RebuildSet};
//!
//! let mut set = RebuildSet::new();
//! for i in 0..100 {
//!     assert!(set.insert(i));
//! }
//! assert!(!set.insert(20));
//! assert!(set.contains(&20));
//!
//! let mut snapshot = set.snapshot();
//! assert_eq!(snapshot.try_next(), Ok(0));
//! set.insert(100);
//! assert_eq!(snapshot.try_next(), Err(Error::StructuralChange));
//! ```
#![deny(unsafe_op_in_unsafe_fn)]

use std::borrow::Borrow;
use std::collections::{btree_set, BTreeSet};
use std::fmt;

use crate::iter::Registry;
#[cfg(feature = "full_validation")]
use crate::node::validate_tree;
use crate::node::{build_from, place, search, teardown, Link, Node, Placement};
use crate::types::full_tree_capacity;

pub use crate::error::{Error, Result};
pub use crate::iter::{IterState, SnapshotIter};
pub use crate::node::{ConsumingInOrderIter, InOrderIter};
pub use crate::types::{CountedIter, Ratio, RatioT, TreeHeightBound};

mod error;
mod iter;
mod node;
mod types;

/// Nominal height a fresh set starts out with.
pub const DEFAULT_MAX_HEIGHT: u32 = 3;

pub type Iter<'a, T> = CountedIter<InOrderIter<'a, T>>;
pub type IntoIter<T> = CountedIter<ConsumingInOrderIter<T>>;

/// The operations every ordered set offers, independent of how it stores its values.
pub trait OrderedSet<T: Ord> {
    type Ascending<'a>: Iterator<Item = &'a T>
    where
        Self: 'a,
        T: 'a;

    /// Returns false if an equal value was already present.
    fn insert(&mut self, value: T) -> bool;
    fn contains(&self, value: &T) -> bool;
    fn clear(&mut self);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn ascending(&self) -> Self::Ascending<'_>;
}

/// Ordered set backed by a binary search tree that is rebuilt from scratch whenever an insert
/// lands deeper than `max_height * range_factor`.
///
/// `max_height` starts at [`DEFAULT_MAX_HEIGHT`] and grows by one at a rebuild whenever the set
/// holds at least as many values as a full tree of that height. The range factor comes from
/// `Balance`, 1.75 by default.
///
/// Snapshots taken with [`snapshot`](Self::snapshot) are invalidated by every later `insert` or
/// `clear`. The set is single-threaded; it is neither `Send` nor `Sync`.
pub struct RebuildSet<T, Balance: TreeHeightBound = Ratio<7, 4>> {
    root: Link<T>,
    len: usize,
    current_height: u32,
    max_height: u32,
    balance: Balance,
    iterators: Registry,
    rebuilds: u64,
}

impl<T> RebuildSet<T> {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<T, Balance: TreeHeightBound> RebuildSet<T, Balance> {
    pub fn with_balance(balance: Balance) -> Self {
        let mut set = Self::default();
        set.balance = balance;
        set
    }

    /// Sets the nominal height the rebuild threshold is computed from.
    pub fn with_max_height(mut self, max_height: u32) -> Self {
        assert!(max_height > 0, "max height must be at least 1");
        self.max_height = max_height;
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deepest insertion depth seen since the last rebuild or clear, counted in edges from the
    /// root. This is a high-water mark, not a fresh measurement of the tree.
    pub fn height(&self) -> u32 {
        self.current_height
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    /// Number of rebuild passes performed over the set's lifetime.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Number of snapshots that are still alive and listening for changes.
    pub fn live_snapshots(&self) -> usize {
        self.iterators.live()
    }

    pub fn clear(&mut self) {
        self.iterators.invalidate_all();
        teardown(self.root.take());
        self.len = 0;
        self.current_height = 0;
    }

    pub fn iter(&self) -> Iter<'_, T> {
        CountedIter::new(InOrderIter::new(self.root.as_deref()), self.len)
    }

    pub fn first(&self) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        while let Some(left) = node.left() {
            node = left;
        }
        Some(node.value())
    }

    pub fn last(&self) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        while let Some(right) = node.right() {
            node = right;
        }
        Some(node.value())
    }

    fn validate_height(&self) {
        let population: usize;
        let actual_height: u32;
        let max_height: u32;
        debug_assert!(
            {
                population = self.len();
                actual_height = self.root.as_deref().map_or(0, Node::measure_height);
                max_height = (population + 1).next_power_of_two().trailing_zeros();
                actual_height <= max_height
            },
            "rebuilt tree with {population} nodes has height {actual_height} which is more than \
            the allowed {max_height}"
        );
    }
}

impl<T: Ord, Balance: TreeHeightBound> RebuildSet<T, Balance> {
    /// Adds a value, returning false if an equal value was already present. Either way, every
    /// outstanding snapshot is invalidated.
    pub fn insert(&mut self, value: T) -> bool {
        self.iterators.invalidate_all();
        let Placement::Placed { depth } = place(&mut self.root, value) else {
            return false;
        };
        self.len += 1;
        if depth > self.current_height {
            self.current_height = depth;
        }
        if self
            .balance
            .needs_rebuild(self.current_height, self.max_height)
        {
            self.rebuild();
        }
        true
    }

    /// Adds a value that may be absent. An absent value is rejected with
    /// [`Error::NullElement`] and leaves the set and its snapshots untouched.
    pub fn try_insert(&mut self, value: Option<T>) -> Result<bool> {
        value
            .map(|value| self.insert(value))
            .ok_or(Error::NullElement)
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        search(self.root.as_deref(), value).is_some()
    }

    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        search(self.root.as_deref(), value).map(Node::value)
    }

    /// Flatten the tree and build it again around medians. Live snapshots were already invalidated
    /// by the insert that got us here, so they are not signalled again.
    fn rebuild(&mut self) {
        let old_max_height = self.max_height;
        self.current_height = 0;
        if self.len >= full_tree_capacity(self.max_height) {
            self.max_height += 1;
            log::trace!(
                "{} values fill a tree of height {old_max_height}; growing max height to {}",
                self.len,
                self.max_height
            );
        }
        let mut values = Vec::with_capacity(self.len);
        values.extend(ConsumingInOrderIter::new(self.root.take()));
        debug_assert_eq!(values.len(), self.len);
        if let Some((root, height)) = build_from(values) {
            self.root = Some(root);
            self.current_height = height;
        }
        self.rebuilds += 1;
        self.validate_height();
        log::debug!(
            "rebuilt {} values to height {} (max height {old_max_height} -> {}, threshold {:.2})",
            self.len,
            self.current_height,
            self.max_height,
            self.balance.height_limit(self.max_height)
        );
    }
}

impl<T: Clone, Balance: TreeHeightBound> RebuildSet<T, Balance> {
    /// The values in ascending order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Copies the current contents into a fail-fast iterator. The iterator is registered with the
    /// set and stops handing out values after the next `insert` or `clear`.
    pub fn snapshot(&mut self) -> SnapshotIter<T> {
        let values = self.to_vec();
        self.iterators.register(values)
    }
}

#[cfg(feature = "full_validation")]
impl<T: Ord + fmt::Debug, Balance: TreeHeightBound> RebuildSet<T, Balance> {
    pub fn fully_validate(&mut self) {
        // Check ordering and parent links inside the tree.
        let count = validate_tree(&mut self.root);
        // Check that the tracked population matches what is actually reachable.
        assert_eq!(count, self.len);
        assert!(self.max_height > 0);
    }
}

impl<T, Balance: TreeHeightBound> Default for RebuildSet<T, Balance> {
    fn default() -> Self {
        Balance::validate();
        Self {
            root: None,
            len: 0,
            current_height: 0,
            max_height: DEFAULT_MAX_HEIGHT,
            balance: Default::default(),
            iterators: Default::default(),
            rebuilds: 0,
        }
    }
}

impl<T, Balance: TreeHeightBound> Drop for RebuildSet<T, Balance> {
    fn drop(&mut self) {
        teardown(self.root.take());
    }
}

impl<T: fmt::Display, Balance: TreeHeightBound> fmt::Display for RebuildSet<T, Balance> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(value, f)?;
        }
        f.write_str("]")
    }
}

impl<T: fmt::Debug, Balance: TreeHeightBound> fmt::Debug for RebuildSet<T, Balance> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Ord, Balance: TreeHeightBound> Extend<T> for RebuildSet<T, Balance> {
    fn extend<Is: IntoIterator<Item = T>>(&mut self, items: Is) {
        for value in items {
            self.insert(value);
        }
    }
}

impl<T: Ord, Balance: TreeHeightBound> FromIterator<T> for RebuildSet<T, Balance> {
    fn from_iter<Is: IntoIterator<Item = T>>(items: Is) -> Self {
        let mut res: Self = Default::default();
        res.extend(items);
        res
    }
}

impl<'a, T, Balance: TreeHeightBound> IntoIterator for &'a RebuildSet<T, Balance> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T, Balance: TreeHeightBound> IntoIterator for RebuildSet<T, Balance> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(mut self) -> IntoIter<T> {
        CountedIter::new(ConsumingInOrderIter::new(self.root.take()), self.len)
    }
}

impl<T: Ord, Balance: TreeHeightBound> OrderedSet<T> for RebuildSet<T, Balance> {
    type Ascending<'a> = Iter<'a, T>
    where
        Self: 'a,
        T: 'a;

    fn insert(&mut self, value: T) -> bool {
        RebuildSet::insert(self, value)
    }

    fn contains(&self, value: &T) -> bool {
        RebuildSet::contains(self, value)
    }

    fn clear(&mut self) {
        RebuildSet::clear(self)
    }

    fn len(&self) -> usize {
        RebuildSet::len(self)
    }

    fn ascending(&self) -> Iter<'_, T> {
        self.iter()
    }
}

impl<T: Ord> OrderedSet<T> for BTreeSet<T> {
    type Ascending<'a> = btree_set::Iter<'a, T>
    where
        Self: 'a,
        T: 'a;

    fn insert(&mut self, value: T) -> bool {
        BTreeSet::insert(self, value)
    }

    fn contains(&self, value: &T) -> bool {
        BTreeSet::contains(self, value)
    }

    fn clear(&mut self) {
        BTreeSet::clear(self)
    }

    fn len(&self) -> usize {
        BTreeSet::len(self)
    }

    fn ascending(&self) -> btree_set::Iter<'_, T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending<T: Clone, B: TreeHeightBound>(set: &RebuildSet<T, B>) -> Vec<T> {
        set.to_vec()
    }

    #[test]
    fn first_rebuild_fires_at_depth_six() {
        let mut set: RebuildSet<u32> = RebuildSet::new();
        for i in 0..6 {
            set.insert(i);
        }
        // A chain of six values reaches depth five, under the 5.25 threshold.
        assert_eq!(set.rebuilds(), 0);
        assert_eq!(set.height(), 5);
        set.insert(6);
        assert_eq!(set.rebuilds(), 1);
        // Seven values fill a full tree of height three.
        assert_eq!(set.max_height(), 4);
        assert_eq!(set.height(), 2);
        assert_eq!(set.root.as_deref().map(Node::value), Some(&3));
    }

    #[test]
    fn rebuild_preserves_content() {
        let mut set: RebuildSet<i64> = RebuildSet::new();
        // Zig-zag inserts so the tree is lopsided but not a pure chain.
        for i in 0..40 {
            let v = if i % 2 == 0 { i } else { 1000 - i };
            set.insert(v);
        }
        let before = ascending(&set);
        let rebuilds = set.rebuilds();
        set.rebuild();
        assert_eq!(set.rebuilds(), rebuilds + 1);
        assert_eq!(ascending(&set), before);
        assert_eq!(set.len(), before.len());
    }

    #[test]
    fn height_is_logarithmic_after_rebuild() {
        let mut set: RebuildSet<usize> = RebuildSet::new();
        let mut last_rebuilds = 0;
        for i in 0..5000 {
            set.insert(i);
            if set.rebuilds() != last_rebuilds {
                last_rebuilds = set.rebuilds();
                let measured = set.root.as_deref().map_or(0, Node::measure_height);
                let n = set.len();
                let bound = (n + 1).next_power_of_two().trailing_zeros();
                assert!(measured <= bound, "height {measured} for {n} values");
                assert_eq!(measured, set.height());
            }
        }
        assert!(last_rebuilds > 0);
    }

    #[test]
    fn max_height_growth_uses_powers_of_two() {
        let mut set: RebuildSet<u32> = RebuildSet::new().with_max_height(10);
        for i in 0..100 {
            set.insert(i);
        }
        // Ascending inserts reach depth 18 (>= 17.5) on the 19th value, far below the 1023
        // values a full tree of height 10 holds.
        assert!(set.rebuilds() > 0);
        assert_eq!(set.max_height(), 10);
    }

    #[test]
    fn duplicates_do_not_trigger_rebuild() {
        let mut set: RebuildSet<u32> = RebuildSet::new();
        for i in 0..6 {
            set.insert(i);
        }
        for i in 0..6 {
            assert!(!set.insert(i));
        }
        assert_eq!(set.rebuilds(), 0);
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn clear_keeps_max_height() {
        let mut set: RebuildSet<u32> = (0..200).collect();
        let grown = set.max_height();
        assert!(grown > DEFAULT_MAX_HEIGHT);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.height(), 0);
        assert_eq!(set.max_height(), grown);
        assert_eq!(set.first(), None);
    }

    #[test]
    fn custom_balance() {
        let mut set = RebuildSet::<u32, Ratio<3, 1>>::with_balance(Ratio::<3, 1>);
        for i in 0..9 {
            set.insert(i);
        }
        // Depth 8 stays under the 3 * 3 threshold.
        assert_eq!(set.rebuilds(), 0);
        set.insert(9);
        assert_eq!(set.rebuilds(), 1);
        assert_eq!(set.balance().range_factor(), 3.0);
    }

    #[test]
    fn rebuild_does_not_renotify() {
        let mut set: RebuildSet<u32> = (0..6).collect();
        let mut snap = set.snapshot();
        assert_eq!(set.live_snapshots(), 1);
        set.insert(6);
        assert_eq!(set.rebuilds(), 1);
        assert_eq!(snap.try_next(), Err(Error::StructuralChange));
        // The registry was emptied by the insert itself.
        assert_eq!(set.live_snapshots(), 0);
    }

    #[test]
    fn btree_set_is_an_ordered_set() {
        fn fill<S: OrderedSet<u8>>(set: &mut S) -> Vec<u8> {
            for v in [5, 1, 9, 1] {
                set.insert(v);
            }
            set.ascending().copied().collect()
        }
        let mut ours: RebuildSet<u8> = RebuildSet::new();
        let mut std_set = BTreeSet::new();
        assert_eq!(fill(&mut ours), fill(&mut std_set));
        assert_eq!(OrderedSet::len(&ours), 3);
        assert!(OrderedSet::contains(&std_set, &9));
    }
}
