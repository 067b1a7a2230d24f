pub trait RatioT: Copy + Default {
    const NUM: isize;
    const DEN: usize;
    const VAL: f64 = (Self::NUM as f64) / (Self::DEN as f64);
}

#[derive(Copy, Clone, Debug)]
pub struct Ratio<const NUM: isize, const DEN: usize>;

impl<const NUM: isize, const DEN: usize> RatioT for Ratio<NUM, DEN> {
    const NUM: isize = NUM;
    const DEN: usize = DEN;
}

impl<const NUM: isize, const DEN: usize> Default for Ratio<NUM, DEN> {
    fn default() -> Self {
        debug_assert!(DEN > 0, "ratio must have a positive denominator");
        Self
    }
}

/// Decides when the tree has grown tall enough that it should be flattened and rebuilt.
pub trait TreeHeightBound: Default + Copy {
    /// Entry point to validate that the type does not place an impossible constraint on the tree's
    /// height.
    fn validate();

    /// The multiplier applied to the nominal height to get the rebuild threshold.
    fn range_factor(&self) -> f64;

    fn height_limit(&self, max_height: u32) -> f64 {
        max_height as f64 * self.range_factor()
    }

    fn needs_rebuild(&self, current_height: u32, max_height: u32) -> bool {
        current_height as f64 >= self.height_limit(max_height)
    }
}

impl<R: RatioT> TreeHeightBound for R {
    fn validate() {
        assert!(Self::VAL > 1.0, "range factor must be greater than 1.0");
    }

    fn range_factor(&self) -> f64 {
        Self::VAL
    }
}

/// Number of values a full binary tree with `height` levels holds, saturating at `usize::MAX`.
pub(crate) fn full_tree_capacity(height: u32) -> usize {
    1usize
        .checked_shl(height)
        .map_or(usize::MAX, |levels| levels - 1)
}

pub struct CountedIter<I: Iterator> {
    iter: I,
    remaining: usize,
}

impl<I: Iterator> CountedIter<I> {
    pub fn new(iter: I, remaining: usize) -> Self {
        Self { iter, remaining }
    }
}

impl<I: Iterator> Iterator for CountedIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.iter.next();
        if next.is_some() {
            self.remaining -= 1;
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<I: Iterator> ExactSizeIterator for CountedIter<I> {}
