use std::borrow::Borrow;
use std::cmp::max;
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::null_mut;

use aliasable::boxed::AliasableBox;

pub type Link<T> = Option<AliasableBox<Node<T>>>;

/// A single vertex of the set's tree. Children are owned; `parent` is a non-owning back-pointer
/// that is null at the root and is never dereferenced to free anything.
#[derive(Debug)]
pub struct Node<T> {
    left: Link<T>,
    right: Link<T>,
    parent: *mut Self,
    value: T,
}

pub enum Placement {
    /// The value now lives in a new leaf this many edges below the root.
    Placed { depth: u32 },
    /// An equal value was already in the tree; nothing changed.
    Duplicate,
}

impl<T> Node<T> {
    pub fn new(value: T) -> AliasableBox<Self> {
        AliasableBox::from_unique(Box::new(Self {
            left: None,
            right: None,
            parent: null_mut(),
            value,
        }))
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn left(&self) -> Option<&Self> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&Self> {
        self.right.as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn consume(this: AliasableBox<Self>) -> T {
        AliasableBox::into_unique(this).value
    }

    fn left_child(&mut self) -> Child<'_, T> {
        let owner: *mut Self = self;
        Child {
            opt: &mut self.left,
            owner,
        }
    }

    fn right_child(&mut self) -> Child<'_, T> {
        let owner: *mut Self = self;
        Child {
            opt: &mut self.right,
            owner,
        }
    }

    /// Number of edges on the longest path from this node down to a leaf.
    pub fn measure_height(&self) -> u32 {
        if self.is_leaf() {
            return 0;
        }
        let left = self.left().map_or(0, |child| child.measure_height() + 1);
        let right = self.right().map_or(0, |child| child.measure_height() + 1);
        max(left, right)
    }
}

impl<T: Hash> Hash for Node<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl<T: fmt::Display> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

/// One child slot of a node, carrying the address of its owner so that anything put into the
/// slot gets its parent pointer set.
struct Child<'a, T> {
    opt: &'a mut Link<T>,
    owner: *mut Node<T>,
}

impl<'a, T> Child<'a, T> {
    fn replace(&mut self, mut with: AliasableBox<Node<T>>) -> Link<T> {
        with.parent = self.owner;
        self.opt.replace(with)
    }

    #[cfg(feature = "full_validation")]
    fn validate(&self) {
        if let Some(child) = self.opt.as_ref() {
            assert_eq!(child.parent, self.owner)
        }
    }
}

/// Bubble `value` down from `root` to the first empty child slot on its search path.
pub fn place<T: Ord>(root: &mut Link<T>, value: T) -> Placement {
    let mut slot = root;
    let mut parent: *mut Node<T> = null_mut();
    let mut depth = 0;
    loop {
        match slot {
            None => {
                let mut leaf = Node::new(value);
                leaf.parent = parent;
                *slot = Some(leaf);
                return Placement::Placed { depth };
            }
            Some(node) => {
                parent = &mut **node;
                slot = match value.cmp(&node.value) {
                    Equal => return Placement::Duplicate,
                    Less => &mut node.left,
                    Greater => &mut node.right,
                };
                depth += 1;
            }
        }
    }
}

pub fn search<'a, T, Q>(root: Option<&'a Node<T>>, value: &Q) -> Option<&'a Node<T>>
where
    T: Borrow<Q>,
    Q: Ord + ?Sized,
{
    let mut cursor = root;
    while let Some(node) = cursor {
        cursor = match value.cmp(node.value.borrow()) {
            Equal => return Some(node),
            Less => node.left(),
            Greater => node.right(),
        };
    }
    None
}

/// Build a perfectly balanced tree from values that are already strictly ascending. Returns the
/// root and the height of the built tree.
pub fn build_from<T>(items: Vec<T>) -> Option<(AliasableBox<Node<T>>, u32)> {
    if items.is_empty() {
        None
    } else {
        // SAFETY: we just checked that items is non-empty.
        Some(unsafe { must_build_from(items) })
    }
}

/// Build a tree from a set of items that must be non-empty.
unsafe fn must_build_from<T>(mut items: Vec<T>) -> (AliasableBox<Node<T>>, u32) {
    debug_assert!(!items.is_empty());
    fn build_from_recursive<T>(items: &mut Vec<T>, begin: usize) -> (AliasableBox<Node<T>>, u32) {
        // The midpoint biases rightward when the slice being built has an even number of
        // items, so the root of the whole build is always `items[len / 2]`.
        let pivot = begin + (items.len() - begin) / 2;
        // The values vec is rebuilt into a tree strictly from right to left, always removing
        // elements by popping them.
        let right = if pivot + 1 < items.len() {
            Some(build_from_recursive(items, pivot + 1))
        } else {
            None
        };
        // SAFETY: `pivot` is a valid index and we recursed to deplete all the items to the right
        // of it, so it is now the last item in the vec.
        let mut tree = Node::new(unsafe { items.pop().unwrap_unchecked() });
        debug_assert_eq!(items.len(), pivot);
        let mut height = 0;
        if let Some((right_child, right_height)) = right {
            tree.right_child().replace(right_child);
            height = right_height + 1;
        }
        if pivot > begin {
            let (left_child, left_height) = build_from_recursive(items, begin);
            tree.left_child().replace(left_child);
            height = max(height, left_height + 1);
        }
        (tree, height)
    }
    let result = build_from_recursive(&mut items, 0);
    debug_assert!(items.is_empty());
    result
}

/// Borrowing in-order walk over a subtree.
pub struct InOrderIter<'a, T> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T> InOrderIter<'a, T> {
    pub fn new(root: Option<&'a Node<T>>) -> Self {
        let mut iter = Self { stack: Vec::new() };
        iter.push_left_spine(root);
        iter
    }

    fn push_left_spine(&mut self, mut next: Option<&'a Node<T>>) {
        while let Some(node) = next {
            self.stack.push(node);
            next = node.left();
        }
    }
}

impl<'a, T> Iterator for InOrderIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right());
        Some(&node.value)
    }
}

/// Consuming in-order walk that tears the tree down as it goes.
pub struct ConsumingInOrderIter<T> {
    stack: Vec<AliasableBox<Node<T>>>,
}

impl<T> ConsumingInOrderIter<T> {
    pub fn new(root: Link<T>) -> Self {
        let mut iter = Self { stack: Vec::new() };
        iter.push_left_spine(root);
        iter
    }

    fn push_left_spine(&mut self, mut next: Link<T>) {
        while let Some(mut node) = next {
            next = node.left.take();
            self.stack.push(node);
        }
    }
}

impl<T> Iterator for ConsumingInOrderIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let mut node = self.stack.pop()?;
        self.push_left_spine(node.right.take());
        Some(Node::consume(node))
    }
}

/// Release a whole subtree one node at a time, so that dropping a long chain cannot recurse
/// deeply.
pub fn teardown<T>(root: Link<T>) {
    ConsumingInOrderIter::new(root).for_each(drop);
}

#[cfg(feature = "full_validation")]
pub fn validate_tree<T: Ord + fmt::Debug>(root: &mut Link<T>) -> usize {
    let Some(node) = root.as_mut() else { return 0 };
    assert!(node.parent.is_null(), "root must not have a parent");
    impl_node_validation(&mut **node, None, None)
}

#[cfg(feature = "full_validation")]
fn impl_node_validation<T: Ord + fmt::Debug>(
    node: &mut Node<T>,
    lower: Option<&T>,
    upper: Option<&T>,
) -> usize {
    // Check the contained value falls strictly within the allowed bounds.
    if let Some(low) = lower {
        assert!(low < &node.value, "{low:?} is not below {:?}", node.value);
    }
    if let Some(high) = upper {
        assert!(&node.value < high, "{:?} is not below {high:?}", node.value);
    }
    node.left_child().validate();
    node.right_child().validate();
    let Node {
        left, right, value, ..
    } = node;
    let mut count = 1;
    if let Some(child) = left.as_mut() {
        count += impl_node_validation(&mut **child, lower, Some(&*value));
    }
    if let Some(child) = right.as_mut() {
        count += impl_node_validation(&mut **child, Some(&*value), upper);
    }
    count
}
