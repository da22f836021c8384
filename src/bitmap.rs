//! Bit vectors of logical processor indices
//!
//! [`Bitmap`] is the processor-set algebra that every query in this crate is
//! built upon: a growable vector of bits, one per logical processor index,
//! with the usual set operations (inclusion, intersection, union,
//! difference) and the textual rendering used by topology formatting.
//!
//! You will rarely manipulate a `Bitmap` directly. The topology APIs traffic
//! in the [`CpuSet`] newtype, which forwards to this type.
//!
//! [`CpuSet`]: crate::cpu::cpuset::CpuSet

#[cfg(any(test, feature = "proptest"))]
use proptest::prelude::*;
#[allow(unused)]
#[cfg(test)]
use similar_asserts::assert_eq;
use std::{
    borrow::Borrow,
    fmt,
    hash::{Hash, Hasher},
    iter::FusedIterator,
    ops::{
        BitAnd, BitAndAssign, BitOr, BitOrAssign, Bound, RangeBounds, Sub, SubAssign,
    },
};

/// Number of bits per storage word
const WORD_BITS: usize = u64::BITS as usize;

/// Set of logical processor indices, stored as a variable-width bit vector
///
/// This type only models finite sets: there is no "infinitely set" state,
/// and therefore no complement operation. Every
/// operation that the topology queries need (emptiness, equality, inclusion,
/// intersection, union, difference) is provided, along with single-index and
/// index-range edition.
///
/// The textual rendering is the usual list syntax, e.g. `"0-3,8"`, with the
/// empty set rendered as an empty string.
///
/// # Examples
///
/// ```
/// use hwtopo::bitmap::Bitmap;
///
/// let mut set = Bitmap::from_range(0..4);
/// set.set(8);
/// assert_eq!(set.to_string(), "0-3,8");
/// assert!(set.includes(&Bitmap::from(2)));
/// ```
#[derive(Clone, Default)]
pub struct Bitmap {
    /// Storage words, least significant indices first
    ///
    /// Invariant: the last word, if any, is nonzero. This normalization is
    /// what makes the derived-looking `Eq`/`Hash` implementations sound.
    words: Vec<u64>,
}

impl Bitmap {
    /// Create an empty bitmap
    ///
    /// # Examples
    ///
    /// ```
    /// use hwtopo::bitmap::Bitmap;
    ///
    /// let empty = Bitmap::new();
    /// assert!(empty.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bitmap with all indices of `range` set
    ///
    /// # Panics
    ///
    /// Panics if the upper end of `range` is unbounded, since this type only
    /// models finite sets.
    ///
    /// # Examples
    ///
    /// ```
    /// use hwtopo::bitmap::Bitmap;
    ///
    /// assert_eq!(Bitmap::from_range(2..=5).to_string(), "2-5");
    /// ```
    pub fn from_range(range: impl RangeBounds<usize>) -> Self {
        let mut result = Self::new();
        result.set_range(range);
        result
    }

    /// Set the bit at `idx`
    pub fn set(&mut self, idx: usize) {
        let word = idx / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (idx % WORD_BITS);
    }

    /// Set all bits of `range`
    ///
    /// # Panics
    ///
    /// Panics if the upper end of `range` is unbounded, see
    /// [`from_range()`](Self::from_range).
    pub fn set_range(&mut self, range: impl RangeBounds<usize>) {
        let start = match range.start_bound() {
            Bound::Included(&idx) => idx,
            Bound::Excluded(&idx) => idx + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&idx) => idx + 1,
            Bound::Excluded(&idx) => idx,
            Bound::Unbounded => panic!("cannot set an unbounded range in a finite bitmap"),
        };
        for idx in start..end {
            self.set(idx);
        }
    }

    /// Clear the bit at `idx`
    pub fn unset(&mut self, idx: usize) {
        let word = idx / WORD_BITS;
        if let Some(bits) = self.words.get_mut(word) {
            *bits &= !(1 << (idx % WORD_BITS));
        }
        self.trim();
    }

    /// Clear all bits
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Make this bitmap a copy of `other`, reusing the existing storage
    pub fn copy_from(&mut self, other: &Self) {
        self.words.clear();
        self.words.extend_from_slice(&other.words);
    }

    /// Truth that the bit at `idx` is set
    pub fn is_set(&self, idx: usize) -> bool {
        self.words
            .get(idx / WORD_BITS)
            .is_some_and(|&bits| bits & (1 << (idx % WORD_BITS)) != 0)
    }

    /// Truth that no bit is set
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of set bits
    pub fn weight(&self) -> usize {
        self.words.iter().map(|bits| bits.count_ones() as usize).sum()
    }

    /// Lowest set bit, if any
    pub fn first_set(&self) -> Option<usize> {
        self.words
            .iter()
            .position(|&bits| bits != 0)
            .map(|word| word * WORD_BITS + self.words[word].trailing_zeros() as usize)
    }

    /// Highest set bit, if any
    pub fn last_set(&self) -> Option<usize> {
        let bits = *self.words.last()?;
        Some((self.words.len() - 1) * WORD_BITS + (WORD_BITS - 1 - bits.leading_zeros() as usize))
    }

    /// Iterate over set bits in increasing index order
    pub fn iter_set(&self) -> SetIndexIter<'_> {
        SetIndexIter {
            words: &self.words,
            word_idx: 0,
            word: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Truth that `inner` is a subset of `self`
    ///
    /// The empty bitmap is included in every bitmap, itself included.
    pub fn includes(&self, inner: &Self) -> bool {
        inner
            .words
            .iter()
            .enumerate()
            .all(|(word, &bits)| bits & !self.words.get(word).copied().unwrap_or(0) == 0)
    }

    /// Truth that `self` and `rhs` have at least one set bit in common
    pub fn intersects(&self, rhs: &Self) -> bool {
        self.words
            .iter()
            .zip(&rhs.words)
            .any(|(&lhs, &rhs)| lhs & rhs != 0)
    }

    /// Restore the no-trailing-zero-word invariant
    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl<B: Borrow<Bitmap>> BitAnd<B> for &Bitmap {
    type Output = Bitmap;

    fn bitand(self, rhs: B) -> Bitmap {
        let rhs = rhs.borrow();
        let mut result = Bitmap {
            words: self
                .words
                .iter()
                .zip(&rhs.words)
                .map(|(&lhs, &rhs)| lhs & rhs)
                .collect(),
        };
        result.trim();
        result
    }
}

impl<B: Borrow<Self>> BitAnd<B> for Bitmap {
    type Output = Self;

    fn bitand(mut self, rhs: B) -> Self {
        self &= rhs.borrow();
        self
    }
}

impl<B: Borrow<Self>> BitAndAssign<B> for Bitmap {
    fn bitand_assign(&mut self, rhs: B) {
        let rhs = rhs.borrow();
        self.words.truncate(rhs.words.len());
        for (lhs, &rhs) in self.words.iter_mut().zip(&rhs.words) {
            *lhs &= rhs;
        }
        self.trim();
    }
}

impl<B: Borrow<Bitmap>> BitOr<B> for &Bitmap {
    type Output = Bitmap;

    fn bitor(self, rhs: B) -> Bitmap {
        let mut result = self.clone();
        result |= rhs.borrow();
        result
    }
}

impl<B: Borrow<Self>> BitOr<B> for Bitmap {
    type Output = Self;

    fn bitor(mut self, rhs: B) -> Self {
        self |= rhs.borrow();
        self
    }
}

impl<B: Borrow<Self>> BitOrAssign<B> for Bitmap {
    fn bitor_assign(&mut self, rhs: B) {
        let rhs = rhs.borrow();
        if rhs.words.len() > self.words.len() {
            self.words.resize(rhs.words.len(), 0);
        }
        for (lhs, &rhs) in self.words.iter_mut().zip(&rhs.words) {
            *lhs |= rhs;
        }
    }
}

impl<B: Borrow<Bitmap>> Sub<B> for &Bitmap {
    type Output = Bitmap;

    fn sub(self, rhs: B) -> Bitmap {
        let mut result = self.clone();
        result -= rhs.borrow();
        result
    }
}

impl<B: Borrow<Self>> Sub<B> for Bitmap {
    type Output = Self;

    fn sub(mut self, rhs: B) -> Self {
        self -= rhs.borrow();
        self
    }
}

impl<B: Borrow<Self>> SubAssign<B> for Bitmap {
    fn sub_assign(&mut self, rhs: B) {
        let rhs = rhs.borrow();
        for (lhs, &rhs) in self.words.iter_mut().zip(&rhs.words) {
            *lhs &= !rhs;
        }
        self.trim();
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({self})")
    }
}

impl fmt::Display for Bitmap {
    /// List syntax: comma-separated index ranges, e.g. `"0-3,8"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::new();
        let mut iter = self.iter_set().peekable();
        while let Some(first) = iter.next() {
            let mut last = first;
            while iter.peek() == Some(&(last + 1)) {
                last = iter.next().expect("peek said there is a next index");
            }
            if !text.is_empty() {
                text.push(',');
            }
            match last - first {
                0 => text.push_str(&first.to_string()),
                _ => text.push_str(&format!("{first}-{last}")),
            }
        }
        f.pad(&text)
    }
}

impl Eq for Bitmap {}

impl<I: Borrow<usize>> Extend<I> for Bitmap {
    fn extend<T: IntoIterator<Item = I>>(&mut self, iter: T) {
        for idx in iter {
            self.set(*idx.borrow());
        }
    }
}

impl From<usize> for Bitmap {
    /// Bitmap with the single bit `idx` set
    fn from(idx: usize) -> Self {
        let mut result = Self::new();
        result.set(idx);
        result
    }
}

impl<I: Borrow<usize>> FromIterator<I> for Bitmap {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        let mut result = Self::new();
        result.extend(iter);
        result
    }
}

impl Hash for Bitmap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.words.hash(state);
    }
}

impl<'bitmap> IntoIterator for &'bitmap Bitmap {
    type Item = usize;
    type IntoIter = SetIndexIter<'bitmap>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_set()
    }
}

impl<B: Borrow<Self>> PartialEq<B> for Bitmap {
    fn eq(&self, other: &B) -> bool {
        self.words == other.borrow().words
    }
}

#[cfg(any(test, feature = "proptest"))]
impl Arbitrary for Bitmap {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with((): ()) -> Self::Strategy {
        // Cover a few words' worth of indices so that word boundaries get
        // exercised without making set enumeration expensive
        proptest::collection::btree_set(0..3 * WORD_BITS, 0..=WORD_BITS)
            .prop_map(Self::from_iter)
            .boxed()
    }
}

/// Iterator over the set bits of a [`Bitmap`], in increasing index order
///
/// Returned by [`Bitmap::iter_set()`].
#[derive(Clone, Debug)]
pub struct SetIndexIter<'bitmap> {
    /// Storage words of the underlying bitmap
    words: &'bitmap [u64],

    /// Index of the word currently being drained
    word_idx: usize,

    /// Remaining bits of the current word
    word: u64,
}

impl Iterator for SetIndexIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.word == 0 {
            self.word_idx += 1;
            self.word = *self.words.get(self.word_idx)?;
        }
        let bit = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        Some(self.word_idx * WORD_BITS + bit)
    }
}

impl FusedIterator for SetIndexIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::collections::BTreeSet;

    #[test]
    fn empty() {
        let empty = Bitmap::new();
        assert!(empty.is_empty());
        assert_eq!(empty.weight(), 0);
        assert_eq!(empty.first_set(), None);
        assert_eq!(empty.last_set(), None);
        assert_eq!(empty.iter_set().count(), 0);
        assert_eq!(empty.to_string(), "");
        assert!(empty.includes(&empty));
        assert!(!empty.intersects(&empty));
    }

    #[test]
    fn single_bits() {
        let mut set = Bitmap::new();
        set.set(3);
        set.set(67);
        assert!(set.is_set(3) && set.is_set(67));
        assert!(!set.is_set(2) && !set.is_set(64));
        assert_eq!(set.weight(), 2);
        assert_eq!(set.first_set(), Some(3));
        assert_eq!(set.last_set(), Some(67));
        assert_eq!(set.to_string(), "3,67");

        set.unset(67);
        assert_eq!(set, Bitmap::from(3));
        assert_eq!(set.last_set(), Some(3));
    }

    #[test]
    fn ranges() {
        assert_eq!(Bitmap::from_range(0..4).to_string(), "0-3");
        assert_eq!(Bitmap::from_range(62..=65).to_string(), "62-65");
        assert_eq!(Bitmap::from_range(4..4), Bitmap::new());
        assert_eq!(
            Bitmap::from_range(0..3) | Bitmap::from(7),
            [0usize, 1, 2, 7].into_iter().collect::<Bitmap>()
        );
        assert_eq!((Bitmap::from_range(0..3) | Bitmap::from(7)).to_string(), "0-2,7");
    }

    #[test]
    fn set_algebra() {
        let low = Bitmap::from_range(0..4);
        let high = Bitmap::from_range(4..8);
        let all = Bitmap::from_range(0..8);

        assert!(all.includes(&low) && all.includes(&high));
        assert!(!low.includes(&all));
        assert!(!low.intersects(&high));
        assert_eq!(&low | &high, all);
        assert_eq!(&all & &low, low);
        assert_eq!(&all - &high, low);
        assert!((&low & &high).is_empty());
    }

    #[test]
    fn copy_from() {
        let mut dest = Bitmap::from_range(0..100);
        dest.copy_from(&Bitmap::from(1));
        assert_eq!(dest, Bitmap::from(1));
    }

    proptest! {
        #[test]
        fn union_includes_operands(lhs: Bitmap, rhs: Bitmap) {
            let union = &lhs | &rhs;
            prop_assert!(union.includes(&lhs));
            prop_assert!(union.includes(&rhs));
            prop_assert_eq!(union.iter_set().count(), union.weight());
        }

        #[test]
        fn intersection_included_in_operands(lhs: Bitmap, rhs: Bitmap) {
            let intersection = &lhs & &rhs;
            prop_assert!(lhs.includes(&intersection));
            prop_assert!(rhs.includes(&intersection));
            prop_assert_eq!(intersection.is_empty(), !lhs.intersects(&rhs));
        }

        #[test]
        fn difference_disjoint_from_subtrahend(lhs: Bitmap, rhs: Bitmap) {
            let difference = &lhs - &rhs;
            prop_assert!(!difference.intersects(&rhs));
            prop_assert_eq!(&difference | (&lhs & &rhs), lhs);
        }

        #[test]
        fn inclusion_matches_union(lhs: Bitmap, rhs: Bitmap) {
            prop_assert_eq!(lhs.includes(&rhs), &lhs | &rhs == lhs);
        }

        #[test]
        fn iteration_roundtrip(indices in proptest::collection::btree_set(0..256usize, 0..=64)) {
            let set = indices.iter().collect::<Bitmap>();
            prop_assert_eq!(set.iter_set().collect::<BTreeSet<_>>(), indices);
        }
    }
}
