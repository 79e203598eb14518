use crate::error::GroupError;
use lazy_static::lazy_static;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    // A run of newlines and/or commas is a single boundary
    static ref DELIMITER_REGEX: Regex = Regex::new(r"[\n,]+").unwrap();
}

/// A single trimmed, non-empty entry of the user's list
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(String);

impl Item {
    /// Trim `raw` and wrap it, or return `None` when nothing is left
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Item(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered list of items parsed from raw input
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemList(Vec<Item>);

impl ItemList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Item] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Item> {
        self.0
    }

    /// One item per line, the form the shuffled list is written back in
    pub fn to_text(&self) -> String {
        self.0
            .iter()
            .map(Item::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<Item>> for ItemList {
    fn from(items: Vec<Item>) -> Self {
        ItemList(items)
    }
}

impl FromIterator<Item> for ItemList {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        ItemList(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ItemList {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Number of members per group, always at least one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSize(usize);

impl GroupSize {
    /// Validate a numeric size
    pub fn new(size: i64) -> Result<Self, GroupError> {
        if size < 1 {
            return Err(GroupError::InvalidGroupSize);
        }
        Ok(GroupSize(usize::try_from(size).unwrap_or(usize::MAX)))
    }

    /// Parse the group-size field
    ///
    /// Reads the leading integer of the field the way a lenient form input
    /// does: leading whitespace is skipped, an optional sign is accepted and
    /// anything after the digits is ignored, so `"2.5"` gives 2 and `"4 people"`
    /// gives 4. A field with no leading digits is rejected.
    pub fn parse(field: &str) -> Result<Self, GroupError> {
        let rest = field.trim_start();
        let (negative, rest) = match rest.as_bytes().first() {
            Some(b'-') => (true, &rest[1..]),
            Some(b'+') => (false, &rest[1..]),
            _ => (false, rest),
        };

        let digits: &str = {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            &rest[..end]
        };
        if digits.is_empty() {
            return Err(GroupError::InvalidGroupSize);
        }
        if negative {
            // Any digits after a minus sign are zero or negative
            return Err(GroupError::InvalidGroupSize);
        }

        // Oversized values still describe "everyone in one group"
        let value = digits.parse::<usize>().unwrap_or(usize::MAX);
        if value == 0 {
            return Err(GroupError::InvalidGroupSize);
        }
        Ok(GroupSize(value))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Ordered groups produced by one generation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSet(Vec<Vec<Item>>);

impl GroupSet {
    pub fn groups(&self) -> &[Vec<Item>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length of the largest group, zero when there are none
    pub fn longest(&self) -> usize {
        self.0.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// All items in group order
    pub fn concat(&self) -> ItemList {
        self.0.iter().flatten().cloned().collect()
    }

    /// Plain string form, handy for JSON views and assertions
    pub fn to_strings(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .map(|group| group.iter().map(|item| item.as_str().to_string()).collect())
            .collect()
    }
}

/// Split raw text into items
///
/// Splits on any run of newlines and commas, trims every token and drops the
/// empty ones. Blank input yields an empty list; rejecting it is up to the
/// caller.
pub fn parse(raw: &str) -> ItemList {
    DELIMITER_REGEX.split(raw).filter_map(Item::new).collect()
}

/// Number of items `raw` parses to
pub fn item_count(raw: &str) -> usize {
    DELIMITER_REGEX
        .split(raw)
        .filter(|token| !token.trim().is_empty())
        .count()
}

/// Slice `items` into consecutive groups of `size`
///
/// The last group holds whatever remains and may be shorter.
pub fn partition(items: &ItemList, size: GroupSize) -> Result<GroupSet, GroupError> {
    if items.is_empty() {
        return Err(GroupError::EmptyInput);
    }

    let groups = items
        .as_slice()
        .chunks(size.get())
        .map(<[Item]>::to_vec)
        .collect();

    Ok(GroupSet(groups))
}

/// Parse the raw list and the size field, then partition
///
/// An empty list is reported before a bad size.
pub fn group_text(raw: &str, size_field: &str) -> Result<GroupSet, GroupError> {
    let items = parse(raw);
    if items.is_empty() {
        return Err(GroupError::EmptyInput);
    }
    let size = GroupSize::parse(size_field)?;
    partition(&items, size)
}

/// Return the items in a uniformly random order
pub fn shuffle(items: &ItemList) -> ItemList {
    shuffle_with(items, &mut rand::thread_rng())
}

/// Shuffle with a caller-supplied generator
pub fn shuffle_with<R: Rng + ?Sized>(items: &ItemList, rng: &mut R) -> ItemList {
    let mut shuffled = items.0.clone();
    shuffled.shuffle(rng);
    ItemList(shuffled)
}
