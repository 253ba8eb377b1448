//! Ordered list of items partitioned into named sections.
//!
//! [`SectionedList`] is used to hold a calculator's input descriptors grouped
//! for display (e.g. "Observation", "Source and Conditions"), but it can hold
//! any item type, including plain string notes.
//!
//! # Ordering
//!
//! - The default section (identifier `None`) always exists and is always first.
//! - Named sections are ordered by first use (via [`add_section`],
//!   [`append`], [`prepend`] or [`extend`]) and keep their position when
//!   emptied.
//! - Deleting a named section forgets its position: adding it again puts it at
//!   the current end.
//!
//! Flat indexing walks the sections in order, and the items of each section in
//! insertion order. It is a linear scan, which is fine for lists of tens of
//! items.
//!
//! # Example
//!
//! ```
//! use propcalc_core::sectioned_list::SectionedList;
//!
//! let mut list = SectionedList::new();
//! list.append("b1", Some("b"), Some("Section B"));
//! list.append("d1", None, None);
//! list.append("a1", Some("a"), None);
//! list.append("b2", Some("b"), None);
//!
//! let flat: Vec<_> = list.iter().copied().collect();
//! assert_eq!(flat, ["d1", "b1", "b2", "a1"]);
//! assert_eq!(list.get_section_name(Some("b")).unwrap(), Some("Section B"));
//! ```
//!
//! [`add_section`]: SectionedList::add_section
//! [`append`]: SectionedList::append
//! [`prepend`]: SectionedList::prepend
//! [`extend`]: SectionedList::extend

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::errors::CalcError;

/// Message used for a note when a note block fails with an unexpected error.
pub const DEFAULT_NOTE_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Error type for [`SectionedList`] lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    #[error("Section {0:?} not found")]
    SectionNotFound(Option<String>),
    #[error("No item matched the given predicate")]
    NoMatchingItem,
    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: isize, len: usize },
    #[error("Section {0:?} appears more than once")]
    DuplicateSection(Option<String>),
}

/// Which sections a bulk operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSelector<'a> {
    /// Every section, in order
    All,
    /// Only the default (unnamed) section
    Default,
    /// Only the named section
    Named(&'a str),
}

/// Error returned from a note accumulation block.
#[derive(Error, Debug)]
pub enum NoteError {
    /// Abandon the block without adding a note.
    #[error("skipped")]
    Skip,
    /// Replace the notes with one built from this message.
    #[error("{0}")]
    User(String),
    /// Replace the notes with one built from the default error message.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<CalcError> for NoteError {
    fn from(err: CalcError) -> Self {
        match err {
            CalcError::User(message) => NoteError::User(message),
            other => NoteError::Other(Box::new(other)),
        }
    }
}

/// Options for [`SectionedList::accumulate_notes`].
#[derive(Debug, Clone, Copy)]
pub struct NoteOptions<'a> {
    /// Display name to give the target section
    pub section_name: Option<&'a str>,
    /// Register the section even if no notes were produced
    pub include_empty: bool,
    /// Note text used when the block fails with an unexpected error
    pub default_error_message: &'a str,
}

impl Default for NoteOptions<'_> {
    fn default() -> Self {
        Self {
            section_name: None,
            include_empty: false,
            default_error_message: DEFAULT_NOTE_ERROR_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Section<T> {
    id: Option<String>,
    items: Vec<T>,
}

/// A borrowed view of one section.
#[derive(Debug, Clone, Copy)]
pub struct SectionRef<'a, T> {
    pub id: Option<&'a str>,
    pub name: Option<&'a str>,
    pub items: &'a [T],
}

/// A mutable view of one section.
///
/// Changes made through `items` are changes to the owning list.
#[derive(Debug)]
pub struct SectionMut<'a, T> {
    pub id: Option<&'a str>,
    pub name: Option<&'a str>,
    pub items: &'a mut Vec<T>,
}

fn identity_formatter(message: String) -> String {
    message
}

/// Ordered, sectioned sequence of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SectionedListData<T>")]
pub struct SectionedList<T> {
    /// The default section is always at index 0.
    sections: Vec<Section<T>>,
    /// Display names, stored separately from membership.
    default_name: Option<String>,
    names: BTreeMap<String, String>,
    #[serde(skip)]
    note_formatter: fn(String) -> String,
}

/// Serialized form of a [`SectionedList`], checked before use.
#[derive(Deserialize)]
struct SectionedListData<T> {
    sections: Vec<Section<T>>,
    #[serde(default)]
    default_name: Option<String>,
    #[serde(default)]
    names: BTreeMap<String, String>,
}

impl<T> TryFrom<SectionedListData<T>> for SectionedList<T> {
    type Error = SectionError;

    /// Moves the default section to the front, creating it if absent.
    /// Repeated section identifiers are rejected.
    fn try_from(data: SectionedListData<T>) -> Result<Self, Self::Error> {
        let mut sections = data.sections;
        for (i, section) in sections.iter().enumerate() {
            if sections[..i].iter().any(|s| s.id == section.id) {
                return Err(SectionError::DuplicateSection(section.id.clone()));
            }
        }

        let default = match sections.iter().position(|s| s.id.is_none()) {
            Some(i) => sections.remove(i),
            None => Section {
                id: None,
                items: Vec::new(),
            },
        };
        sections.insert(0, default);

        Ok(Self {
            sections,
            default_name: data.default_name,
            names: data.names,
            note_formatter: identity_formatter,
        })
    }
}

impl<T> Default for SectionedList<T> {
    fn default() -> Self {
        Self {
            sections: vec![Section {
                id: None,
                items: Vec::new(),
            }],
            default_name: None,
            names: BTreeMap::new(),
            note_formatter: identity_formatter,
        }
    }
}

impl<T: PartialEq> PartialEq for SectionedList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.sections == other.sections
            && self.default_name == other.default_name
            && self.names == other.names
    }
}

impl<T> SectionedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the function applied to error messages before they are stored as notes.
    pub fn with_note_formatter(mut self, formatter: fn(String) -> String) -> Self {
        self.note_formatter = formatter;
        self
    }

    fn position(&self, section: Option<&str>) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.id.as_deref() == section)
    }

    fn ensure_section(&mut self, section: Option<&str>) -> usize {
        match self.position(section) {
            Some(i) => i,
            None => {
                self.sections.push(Section {
                    id: section.map(str::to_string),
                    items: Vec::new(),
                });
                self.sections.len() - 1
            }
        }
    }

    fn set_name(&mut self, section: Option<&str>, name: Option<&str>) {
        match (section, name) {
            (_, None) => {}
            (None, Some(name)) => self.default_name = Some(name.to_string()),
            (Some(id), Some(name)) => {
                self.names.insert(id.to_string(), name.to_string());
            }
        }
    }

    fn name_of<'a>(
        default_name: &'a Option<String>,
        names: &'a BTreeMap<String, String>,
        section: Option<&str>,
    ) -> Option<&'a str> {
        match section {
            None => default_name.as_deref(),
            Some(id) => names.get(id).map(String::as_str),
        }
    }

    /// Register a section, setting its display name if one is given.
    ///
    /// Registering an existing section keeps its position.
    pub fn add_section(&mut self, section: Option<&str>, name: Option<&str>) {
        self.ensure_section(section);
        self.set_name(section, name);
    }

    /// Add an item to the end of a section, creating the section if needed.
    pub fn append(&mut self, item: T, section: Option<&str>, section_name: Option<&str>) {
        let i = self.ensure_section(section);
        self.set_name(section, section_name);
        self.sections[i].items.push(item);
    }

    /// Add an item to the start of a section, creating the section if needed.
    pub fn prepend(&mut self, item: T, section: Option<&str>, section_name: Option<&str>) {
        let i = self.ensure_section(section);
        self.set_name(section, section_name);
        self.sections[i].items.insert(0, item);
    }

    /// Add items to the end of a section, creating the section if needed.
    pub fn extend<I: IntoIterator<Item = T>>(
        &mut self,
        items: I,
        section: Option<&str>,
        section_name: Option<&str>,
    ) {
        let i = self.ensure_section(section);
        self.set_name(section, section_name);
        self.sections[i].items.extend(items);
    }

    /// Add items to the start of a section, keeping their relative order.
    pub fn extend_front<I: IntoIterator<Item = T>>(
        &mut self,
        items: I,
        section: Option<&str>,
        section_name: Option<&str>,
    ) {
        let i = self.ensure_section(section);
        self.set_name(section, section_name);
        let existing = std::mem::take(&mut self.sections[i].items);
        self.sections[i].items.extend(items);
        self.sections[i].items.extend(existing);
    }

    /// Iterate over the sections in order.
    ///
    /// Empty sections are skipped unless `include_empty` is set. The iterator
    /// borrows the list, so it can be recreated as often as needed.
    pub fn by_section(&self, include_empty: bool) -> impl Iterator<Item = SectionRef<'_, T>> {
        let (default_name, names) = (&self.default_name, &self.names);
        self.sections
            .iter()
            .filter(move |s| include_empty || !s.items.is_empty())
            .map(move |s| SectionRef {
                id: s.id.as_deref(),
                name: Self::name_of(default_name, names, s.id.as_deref()),
                items: &s.items,
            })
    }

    /// Iterate over the sections in order with mutable access to their items.
    pub fn by_section_mut(
        &mut self,
        include_empty: bool,
    ) -> impl Iterator<Item = SectionMut<'_, T>> {
        let (default_name, names) = (&self.default_name, &self.names);
        self.sections
            .iter_mut()
            .filter(move |s| include_empty || !s.items.is_empty())
            .map(move |s| SectionMut {
                id: s.id.as_deref(),
                name: Self::name_of(default_name, names, s.id.as_deref()),
                items: &mut s.items,
            })
    }

    fn not_found(section: Option<&str>) -> SectionError {
        SectionError::SectionNotFound(section.map(str::to_string))
    }

    pub fn get_section(&self, section: Option<&str>) -> Result<&[T], SectionError> {
        self.position(section)
            .map(|i| self.sections[i].items.as_slice())
            .ok_or_else(|| Self::not_found(section))
    }

    pub fn get_section_mut(&mut self, section: Option<&str>) -> Result<&mut Vec<T>, SectionError> {
        match self.position(section) {
            Some(i) => Ok(&mut self.sections[i].items),
            None => Err(Self::not_found(section)),
        }
    }

    /// Display name of a registered section, which may be unset.
    pub fn get_section_name(&self, section: Option<&str>) -> Result<Option<&str>, SectionError> {
        self.position(section)
            .map(|_| Self::name_of(&self.default_name, &self.names, section))
            .ok_or_else(|| Self::not_found(section))
    }

    /// Section identifiers in order.
    pub fn list_sections(&self, include_empty: bool) -> Vec<Option<&str>> {
        self.by_section(include_empty).map(|s| s.id).collect()
    }

    /// Delete a section and its items.
    ///
    /// The default section is emptied but stays registered and first.
    pub fn delete_section(&mut self, section: Option<&str>) -> Result<(), SectionError> {
        match (section, self.position(section)) {
            (None, _) => {
                self.sections[0].items.clear();
                Ok(())
            }
            (Some(_), Some(i)) => {
                self.sections.remove(i);
                Ok(())
            }
            (Some(_), None) => Err(Self::not_found(section)),
        }
    }

    /// Total number of items in all sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.items.is_empty())
    }

    /// Iterate over all items in display order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.sections.iter_mut().flat_map(|s| s.items.iter_mut())
    }

    /// First item (in display order) matching the predicate.
    pub fn find_item<P: FnMut(&T) -> bool>(&self, mut predicate: P) -> Option<&T> {
        self.iter().find(|item| predicate(item))
    }

    /// First item matching the predicate, failing if there is none.
    pub fn get_item_where<P: FnMut(&T) -> bool>(&self, predicate: P) -> Result<&T, SectionError> {
        self.find_item(predicate)
            .ok_or(SectionError::NoMatchingItem)
    }

    /// First item matching the predicate, or the given default.
    pub fn get_item_where_or<'a, P: FnMut(&T) -> bool>(
        &'a self,
        predicate: P,
        default: &'a T,
    ) -> &'a T {
        self.find_item(predicate).unwrap_or(default)
    }

    /// Replace each item matching the predicate with `mapping(item)`.
    ///
    /// If the mapping returns `None` the item is deleted instead. At most
    /// `count` items are affected if a count is given. Returns the number of
    /// items replaced or deleted.
    pub fn replace_item_where<P, M>(
        &mut self,
        mut predicate: P,
        mut mapping: M,
        selector: SectionSelector<'_>,
        count: Option<usize>,
    ) -> usize
    where
        P: FnMut(&T) -> bool,
        M: FnMut(&T) -> Option<T>,
    {
        let mut affected = 0;

        for section in self.sections.iter_mut() {
            let selected = match selector {
                SectionSelector::All => true,
                SectionSelector::Default => section.id.is_none(),
                SectionSelector::Named(id) => section.id.as_deref() == Some(id),
            };
            if !selected {
                continue;
            }

            let mut deletions = Vec::new();
            for (i, item) in section.items.iter_mut().enumerate() {
                if count.is_some_and(|n| affected >= n) {
                    break;
                }
                if !predicate(item) {
                    continue;
                }
                match mapping(item) {
                    Some(replacement) => *item = replacement,
                    None => deletions.push(i),
                }
                affected += 1;
            }

            // Deleting from the end keeps the remaining indices valid.
            for i in deletions.into_iter().rev() {
                section.items.remove(i);
            }

            if count.is_some_and(|n| affected >= n) {
                break;
            }
        }

        affected
    }

    /// Delete each item matching the predicate, returning the number deleted.
    pub fn delete_item_where<P: FnMut(&T) -> bool>(
        &mut self,
        predicate: P,
        selector: SectionSelector<'_>,
        count: Option<usize>,
    ) -> usize {
        self.replace_item_where(predicate, |_| None, selector, count)
    }

    /// Resolve a flat index to (section position, index within section).
    ///
    /// Negative indices count from the end.
    fn resolve(&self, index: isize) -> Result<(usize, usize), SectionError> {
        let len = self.len();
        let out_of_range = SectionError::IndexOutOfRange { index, len };
        let mut remaining = if index < 0 {
            let wrapped = len as isize + index;
            if wrapped < 0 {
                return Err(out_of_range);
            }
            wrapped as usize
        } else {
            index as usize
        };

        for (i, section) in self.sections.iter().enumerate() {
            if remaining < section.items.len() {
                return Ok((i, remaining));
            }
            remaining -= section.items.len();
        }

        Err(out_of_range)
    }

    /// Item at a flat index.
    pub fn get(&self, index: isize) -> Result<&T, SectionError> {
        let (s, i) = self.resolve(index)?;
        Ok(&self.sections[s].items[i])
    }

    pub fn get_mut(&mut self, index: isize) -> Result<&mut T, SectionError> {
        let (s, i) = self.resolve(index)?;
        Ok(&mut self.sections[s].items[i])
    }

    /// Replace the item at a flat index, returning the old item.
    pub fn set(&mut self, index: isize, item: T) -> Result<T, SectionError> {
        let (s, i) = self.resolve(index)?;
        Ok(std::mem::replace(&mut self.sections[s].items[i], item))
    }

    /// Remove the item at a flat index.
    pub fn remove(&mut self, index: isize) -> Result<T, SectionError> {
        let (s, i) = self.resolve(index)?;
        Ok(self.sections[s].items.remove(i))
    }

    /// Section identifiers mapped to their items, in order.
    pub fn as_dict(&self, include_empty: bool) -> IndexMap<Option<&str>, &[T]> {
        self.by_section(include_empty)
            .map(|s| (s.id, s.items))
            .collect()
    }
}

impl<T: From<String>> SectionedList<T> {
    /// Run a block that collects notes, then store them in a section.
    ///
    /// - If the block succeeds, its notes are appended to `section` (which is
    ///   only created if there are notes, or `include_empty` is set).
    /// - [`NoteError::Skip`] discards the notes.
    /// - [`NoteError::User`] replaces the notes with one note holding the
    ///   error message.
    /// - [`NoteError::Other`] replaces the notes with one note holding the
    ///   default error message.
    ///
    /// Error messages pass through the list's note formatter. Panics are not
    /// caught. Returns the number of notes added.
    pub fn accumulate_notes<F>(
        &mut self,
        section: Option<&str>,
        options: NoteOptions<'_>,
        block: F,
    ) -> usize
    where
        F: FnOnce(&mut Vec<T>) -> Result<(), NoteError>,
    {
        let mut notes = Vec::new();

        let notes = match block(&mut notes) {
            Ok(()) => notes,
            Err(NoteError::Skip) => return 0,
            Err(NoteError::User(message)) => {
                vec![T::from((self.note_formatter)(message))]
            }
            Err(NoteError::Other(err)) => {
                log::debug!("Converting error to note: {err}");
                vec![T::from((self.note_formatter)(
                    options.default_error_message.to_string(),
                ))]
            }
        };

        let added = notes.len();
        if added > 0 || options.include_empty {
            self.extend(notes, section, options.section_name);
        }
        added
    }
}

impl<T> FromIterator<T> for SectionedList<T> {
    /// Collect items into the default section.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter, None, None);
        list
    }
}

impl<T> std::ops::Index<usize> for SectionedList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index as isize) {
            Ok(item) => item,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> std::ops::IndexMut<usize> for SectionedList<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index as isize) {
            Ok(item) => item,
            Err(err) => panic!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(list: &SectionedList<&'static str>) -> Vec<&'static str> {
        list.iter().copied().collect()
    }

    fn sample() -> SectionedList<&'static str> {
        let mut list = SectionedList::new();
        list.extend(["x1", "x2"], Some("x"), Some("Section X"));
        list.append("d1", None, None);
        list.extend(["y1", "y2", "y3"], Some("y"), None);
        list
    }

    #[test]
    fn test_default_section_first() {
        let list = sample();
        assert_eq!(items(&list), ["d1", "x1", "x2", "y1", "y2", "y3"]);
        assert_eq!(list.list_sections(false), [None, Some("x"), Some("y")]);
    }

    #[test]
    fn test_empty_sections_listed_only_when_requested() {
        let mut list: SectionedList<&str> = SectionedList::new();
        list.add_section(Some("a"), Some("A"));
        list.append("b1", Some("b"), None);

        assert_eq!(list.list_sections(false), [Some("b")]);
        assert_eq!(list.list_sections(true), [None, Some("a"), Some("b")]);
    }

    #[test]
    fn test_section_keeps_position_when_emptied() {
        let mut list = sample();
        list.get_section_mut(Some("x")).unwrap().clear();
        list.extend(["x3"], Some("x"), None);

        assert_eq!(items(&list), ["d1", "x3", "y1", "y2", "y3"]);
        assert_eq!(list.list_sections(true), [None, Some("x"), Some("y")]);
    }

    #[test]
    fn test_add_section_is_idempotent() {
        let mut list = sample();
        list.add_section(Some("x"), None);
        list.add_section(Some("x"), Some("Renamed"));

        assert_eq!(list.list_sections(true), [None, Some("x"), Some("y")]);
        assert_eq!(list.get_section_name(Some("x")).unwrap(), Some("Renamed"));
        assert_eq!(list.get_section_name(Some("y")).unwrap(), None);
    }

    #[test]
    fn test_prepend() {
        let mut list = sample();
        list.prepend("x0", Some("x"), None);
        list.extend_front(["y-2", "y-1"], Some("y"), None);

        assert_eq!(
            list.get_section(Some("x")).unwrap(),
            ["x0", "x1", "x2"].as_slice()
        );
        assert_eq!(
            list.get_section(Some("y")).unwrap(),
            ["y-2", "y-1", "y1", "y2", "y3"].as_slice()
        );
    }

    #[test]
    fn test_unknown_section() {
        let list = sample();
        assert_eq!(
            list.get_section(Some("z")),
            Err(SectionError::SectionNotFound(Some("z".to_string())))
        );
        assert!(list.get_section_name(Some("z")).is_err());
    }

    #[test]
    fn test_delete_default_section_keeps_it() {
        let mut list = sample();
        list.delete_section(None).unwrap();

        assert_eq!(items(&list), ["x1", "x2", "y1", "y2", "y3"]);
        assert_eq!(list.list_sections(true), [None, Some("x"), Some("y")]);

        list.append("d2", None, None);
        assert_eq!(list[0], "d2");
    }

    #[test]
    fn test_delete_named_section_forgets_position() {
        let mut list = sample();
        list.delete_section(Some("x")).unwrap();
        assert_eq!(list.list_sections(true), [None, Some("y")]);

        list.add_section(Some("x"), None);
        assert_eq!(list.list_sections(true), [None, Some("y"), Some("x")]);
        assert!(list.get_section(Some("x")).unwrap().is_empty());

        assert_eq!(
            list.delete_section(Some("z")),
            Err(SectionError::SectionNotFound(Some("z".to_string())))
        );
    }

    #[test]
    fn test_by_section_views() {
        let mut list = sample();
        let sections: Vec<_> = list
            .by_section(false)
            .map(|s| (s.id, s.name, s.items.len()))
            .collect();
        assert_eq!(
            sections,
            [(None, None, 1), (Some("x"), Some("Section X"), 2), (Some("y"), None, 3)]
        );

        for section in list.by_section_mut(false) {
            if section.id == Some("y") {
                section.items.retain(|item| *item != "y2");
            }
        }
        assert_eq!(items(&list), ["d1", "x1", "x2", "y1", "y3"]);
    }

    #[test]
    fn test_flat_indexing() {
        let mut list = sample();
        assert_eq!(*list.get(0).unwrap(), "d1");
        assert_eq!(*list.get(3).unwrap(), "y1");
        assert_eq!(*list.get(-1).unwrap(), "y3");
        assert_eq!(*list.get(-6).unwrap(), "d1");
        assert_eq!(
            list.get(6),
            Err(SectionError::IndexOutOfRange { index: 6, len: 6 })
        );
        assert!(list.get(-7).is_err());

        assert_eq!(list.set(2, "X2").unwrap(), "x2");
        assert_eq!(list.remove(1).unwrap(), "x1");
        assert_eq!(items(&list), ["d1", "X2", "y1", "y2", "y3"]);

        list[0] = "D1";
        assert_eq!(list[0], "D1");
    }

    #[test]
    fn test_flat_indexing_skips_empty_sections() {
        let mut list: SectionedList<&str> = SectionedList::new();
        list.add_section(Some("empty"), None);
        list.append("b1", Some("b"), None);
        assert_eq!(list[0], "b1");
    }

    #[test]
    fn test_get_item_where() {
        let list = sample();
        assert_eq!(*list.get_item_where(|i| i.starts_with('y')).unwrap(), "y1");
        assert_eq!(
            list.get_item_where(|i| i.starts_with('z')),
            Err(SectionError::NoMatchingItem)
        );
        assert_eq!(*list.get_item_where_or(|i| i.starts_with('z'), &"none"), "none");
    }

    #[test]
    fn test_replace_and_delete_in_one_pass() {
        let mut list = sample();
        let affected = list.replace_item_where(
            |i| i.starts_with('y'),
            |i| if *i == "y2" { None } else { Some("Y") },
            SectionSelector::All,
            None,
        );
        assert_eq!(affected, 3);
        assert_eq!(items(&list), ["d1", "x1", "x2", "Y", "Y"]);
    }

    #[test]
    fn test_delete_adjacent_matches() {
        let mut list = sample();
        let deleted = list.delete_item_where(|i| i.starts_with('y'), SectionSelector::All, None);
        assert_eq!(deleted, 3);
        assert_eq!(items(&list), ["d1", "x1", "x2"]);
    }

    #[test]
    fn test_replace_with_count() {
        let mut list = sample();
        let affected = list.replace_item_where(
            |i| i.len() == 2,
            |_| Some("*"),
            SectionSelector::All,
            Some(4),
        );
        assert_eq!(affected, 4);
        assert_eq!(items(&list), ["*", "*", "*", "*", "y2", "y3"]);
    }

    #[test]
    fn test_section_selectors() {
        let mut list = sample();
        list.append("d2", None, None);

        let deleted = list.delete_item_where(|_| true, SectionSelector::Default, None);
        assert_eq!(deleted, 2);
        assert_eq!(items(&list), ["x1", "x2", "y1", "y2", "y3"]);

        let deleted = list.delete_item_where(|_| true, SectionSelector::Named("y"), Some(2));
        assert_eq!(deleted, 2);
        assert_eq!(items(&list), ["x1", "x2", "y3"]);

        let deleted = list.delete_item_where(|_| true, SectionSelector::Named("z"), None);
        assert_eq!(deleted, 0);
    }

    #[test]
    fn test_as_dict() {
        let list = sample();
        let dict = list.as_dict(false);
        let keys: Vec<_> = dict.keys().copied().collect();
        assert_eq!(keys, [None, Some("x"), Some("y")]);
        assert_eq!(dict[&Some("x")], ["x1", "x2"].as_slice());
    }

    #[test]
    fn test_accumulate_notes_success() {
        let mut list: SectionedList<String> = SectionedList::new();
        let added = list.accumulate_notes(
            Some("notes"),
            NoteOptions {
                section_name: Some("Notes"),
                ..Default::default()
            },
            |notes| {
                notes.push("first".to_string());
                notes.push("second".to_string());
                Ok(())
            },
        );

        assert_eq!(added, 2);
        assert_eq!(
            list.get_section(Some("notes")).unwrap(),
            ["first".to_string(), "second".to_string()].as_slice()
        );
        assert_eq!(list.get_section_name(Some("notes")).unwrap(), Some("Notes"));
    }

    #[test]
    fn test_accumulate_notes_empty() {
        let mut list: SectionedList<String> = SectionedList::new();
        list.accumulate_notes(Some("a"), NoteOptions::default(), |_| Ok(()));
        assert!(list.get_section(Some("a")).is_err());

        list.accumulate_notes(
            Some("b"),
            NoteOptions {
                include_empty: true,
                ..Default::default()
            },
            |_| Ok(()),
        );
        assert!(list.get_section(Some("b")).unwrap().is_empty());
    }

    #[test]
    fn test_accumulate_notes_skip() {
        let mut list: SectionedList<String> = SectionedList::new();
        let added = list.accumulate_notes(Some("a"), NoteOptions::default(), |notes| {
            notes.push("discarded".to_string());
            Err(NoteError::Skip)
        });
        assert_eq!(added, 0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_accumulate_notes_user_error() {
        let mut list: SectionedList<String> =
            SectionedList::new().with_note_formatter(|m| format!("Note: {m}"));
        let added = list.accumulate_notes(None, NoteOptions::default(), |notes| {
            notes.push("discarded".to_string());
            Err(CalcError::user("Opacity out of range").into())
        });
        assert_eq!(added, 1);
        assert_eq!(items_owned(&list), ["Note: Opacity out of range"]);
    }

    #[test]
    fn test_accumulate_notes_other_error() {
        let mut list: SectionedList<String> = SectionedList::new();
        list.accumulate_notes(
            None,
            NoteOptions {
                default_error_message: "Could not check the request.",
                ..Default::default()
            },
            |_| Err(CalcError::internal("broken invariant").into()),
        );
        assert_eq!(items_owned(&list), ["Could not check the request."]);
    }

    fn items_owned(list: &SectionedList<String>) -> Vec<&str> {
        list.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_deserialize_restores_default_section() {
        let mut list: SectionedList<String> =
            serde_json::from_str(r#"{"sections":[],"default_name":null,"names":{}}"#).unwrap();
        assert_eq!(list.list_sections(true), [None]);
        list.delete_section(None).unwrap();
        list.append("d1".to_string(), None, None);
        assert_eq!(items_owned(&list), ["d1"]);

        let list: SectionedList<String> = serde_json::from_str(
            r#"{"sections":[{"id":"a","items":["a1"]},{"id":null,"items":["d1"]}]}"#,
        )
        .unwrap();
        assert_eq!(list.list_sections(false), [None, Some("a")]);
        assert_eq!(items_owned(&list), ["d1", "a1"]);
    }

    #[test]
    fn test_deserialize_rejects_duplicate_sections() {
        let err = serde_json::from_str::<SectionedList<String>>(
            r#"{"sections":[{"id":"a","items":[]},{"id":"a","items":[]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("appears more than once"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let list = sample();
        let json = serde_json::to_string(&list).unwrap();
        let restored: SectionedList<String> = serde_json::from_str(&json).unwrap();
        let restored_items: Vec<_> = restored.iter().map(String::as_str).collect();
        assert_eq!(restored_items, items(&list));
        assert_eq!(
            restored.get_section_name(Some("x")).unwrap(),
            Some("Section X")
        );
    }
}
