//! Tagging support for flow revalidation.
//!
//! A tag names an arbitrary category, typically one dependency of a flow switching
//! decision (for example "source MAC 00:02:e3:0f:80:a4 was learned on port 3"). Tags use
//! superimposed coding: a tag is a 32-bit word with exactly two bits set, so there are
//! 32 * 31 / 2 = 496 distinct tags, and any number of them can be OR-ed together into a
//! single word. The combination always tests as containing every tag that went into it, and
//! possibly some that did not. A false positive only costs an extra revalidation, so that
//! is acceptable.

use std::ops::BitOr;

use rand::Rng;

const N_TAG_BITS: u32 = 32;
const LOG2_N_TAG_BITS: u32 = 5;

/// Number of individual tags a `TagSet` remembers.
pub const TAG_SET_SIZE: usize = 4;

/// A tag, or the OR-combination of several tags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tag(u32);

impl Tag {
    /// Create a tag by choosing two distinct bits uniformly at random.
    pub fn random() -> Tag {
        let mut rng = rand::thread_rng();
        let x = rng.gen_range(0..N_TAG_BITS);
        let y = rng.gen_range(0..N_TAG_BITS - 1);
        Tag::from_bits(x, y)
    }

    /// Create a tag from `seed`. Equal seeds always give equal tags.
    pub fn deterministic(seed: u32) -> Tag {
        let x = seed & (N_TAG_BITS - 1);
        let y = (seed >> LOG2_N_TAG_BITS) % (N_TAG_BITS - 1);
        Tag::from_bits(x, y)
    }

    // `y` ranges over the 31 positions other than `x`.
    fn from_bits(x: u32, y: u32) -> Tag {
        let y = if y >= x { y + 1 } else { y };
        Tag((1 << x) | (1 << y))
    }

    /// Wrap a raw tag word, e.g. one read back from a flow record.
    pub fn from_raw(bits: u32) -> Tag {
        Tag(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if exactly two bits are set.
    pub fn is_valid(self) -> bool {
        let x = self.0 & self.0.wrapping_sub(1);
        let y = x & x.wrapping_sub(1);
        x != 0 && y == 0
    }

    /// True if `self` and `other` share at least one tag, which takes two common bits.
    /// A single common bit does not identify a tag.
    pub fn intersects(self, other: Tag) -> bool {
        let x = self.0 & other.0;
        x & x.wrapping_sub(1) != 0
    }
}

impl BitOr for Tag {
    type Output = Tag;

    fn bitor(self, rhs: Tag) -> Tag {
        Tag(self.0 | rhs.0)
    }
}

/// Accumulates tags with less ambiguity than a single OR-ed word.
///
/// The first `TAG_SET_SIZE` tags each get their own slot. Later tags are OR-ed into the
/// slots round-robin, so each slot grows coarser but no tag is lost. `total` is always the
/// OR of every tag ever added.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    total: Tag,
    tags: [Tag; TAG_SET_SIZE],
    n: usize,
    next: usize,
}

impl TagSet {
    pub fn new() -> TagSet {
        TagSet::default()
    }

    pub fn add(&mut self, tag: Tag) {
        let slot = &mut self.tags[self.next];
        *slot = *slot | tag;
        self.next = (self.next + 1) % TAG_SET_SIZE;
        if self.n < TAG_SET_SIZE {
            self.n += 1;
        }
        self.total = self.total | tag;
    }

    /// True if the set will match no tags at all.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Number of individually tracked tags, at most `TAG_SET_SIZE`.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn total(&self) -> Tag {
        self.total
    }

    /// True if any tag in `tags` is also in the set. `total` is checked first, then at
    /// least one individually stored tag must agree.
    pub fn intersects(&self, tags: Tag) -> bool {
        self.total.intersects(tags) && self.tags.iter().any(|t| t.intersects(tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid() {
        assert!(Tag::from_raw(0b11).is_valid());
        assert!(Tag::from_raw(0x8000_0001).is_valid());
        assert!(!Tag::from_raw(0).is_valid());
        assert!(!Tag::from_raw(0b100).is_valid());
        assert!(!Tag::from_raw(0b111).is_valid());
    }

    #[test]
    fn test_created_tags_are_valid() {
        for _ in 0..1000 {
            assert!(Tag::random().is_valid());
        }
        for seed in 0..5000 {
            assert!(Tag::deterministic(seed).is_valid());
        }
        assert!(Tag::deterministic(u32::max_value()).is_valid());
    }

    #[test]
    fn test_deterministic_is_stable() {
        assert_eq!(Tag::deterministic(12345), Tag::deterministic(12345));
        // seed 0: x = 0, y = 0 -> 1, bits 0 and 1.
        assert_eq!(Tag::deterministic(0).bits(), 0b11);
        // seed 33: x = 1, y = 1 -> 2.
        assert_eq!(Tag::deterministic(33).bits(), 0b110);
    }

    #[test]
    fn test_intersects_needs_two_bits() {
        let a = Tag::from_raw(0b0011);
        let b = Tag::from_raw(0b0110);
        assert!(!a.intersects(b));
        assert!(a.intersects(a));
        assert!((a | b).intersects(a));
        assert!((a | b).intersects(b));
    }

    #[test]
    fn test_intersects_is_symmetric() {
        for i in 0..200u32 {
            let a = Tag::deterministic(i);
            let b = Tag::deterministic(i.wrapping_mul(2654435761));
            assert_eq!(a.intersects(b), b.intersects(a));
            assert!(a.intersects(a));
        }
    }

    #[test]
    fn test_tag_set_overflow() {
        let tags: Vec<Tag> = [0u32, 1, 2, 3, 4].iter()
            .map(|&b| Tag::from_raw((1 << (2 * b)) | (1 << (2 * b + 1))))
            .collect();
        let mut set = TagSet::new();
        assert!(set.is_empty());
        for t in &tags {
            set.add(*t);
        }
        let total = tags.iter().fold(Tag::default(), |acc, t| acc | *t);
        assert_eq!(set.total(), total);
        assert_eq!(set.len(), TAG_SET_SIZE);
        assert!(!set.is_empty());
        assert!(set.intersects(tags[4]));
        for t in &tags {
            assert!(set.intersects(*t));
        }
        // Disjoint from all five.
        assert!(!set.intersects(Tag::from_raw(0b11 << 20)));
    }

    #[test]
    fn test_tag_set_two_stage_rejects() {
        let mut set = TagSet::new();
        set.add(Tag::from_raw(0b0011));
        set.add(Tag::from_raw(0b1100));
        // Two bits of `total` but no single stored tag.
        let query = Tag::from_raw(0b0110);
        assert!(set.total().intersects(query));
        assert!(!set.intersects(query));
        assert!(!TagSet::new().intersects(Tag::from_raw(0b11)));
    }
}
