//! The weave-time fragment graph.
//!
//! Tracks, per canonical name, the number assigned at first mention, how
//! many definitions were seen, where the name was first mentioned, and
//! which code blocks referenced it.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::position::FilePos;

/// Bookkeeping for one fragment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentInfo {
    /// Number assigned in first-mention order, starting at 1. Mentions
    /// include references, not just definitions.
    pub number: usize,
    /// How many `<<name>>=` definitions were seen.
    pub definition_count: usize,
    /// Where the name was first mentioned.
    pub first_mention: FilePos,
    /// Numbers of the code blocks that reference this name.
    pub referenced_from: BTreeSet<usize>,
}

/// All fragment names seen during a weave run, in first-mention order.
#[derive(Debug, Clone, Default)]
pub struct FragmentGraph {
    entries: IndexMap<String, FragmentInfo>,
}

impl FragmentGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a mention of a name, assigning the next number on first
    /// sight. Returns the name's number.
    pub fn mention(&mut self, name: &str, pos: &FilePos) -> usize {
        let next = self.entries.len() + 1;
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| FragmentInfo {
                number: next,
                definition_count: 0,
                first_mention: pos.clone(),
                referenced_from: BTreeSet::new(),
            })
            .number
    }

    /// Records a definition of a previously mentioned name. Returns the
    /// name's number and its 0-based series index within the name.
    pub fn define(&mut self, name: &str) -> Option<(usize, usize)> {
        let info = self.entries.get_mut(name)?;
        let series = info.definition_count;
        info.definition_count += 1;
        Some((info.number, series))
    }

    /// Records that `from_block` (a block number) references the name.
    pub fn reference(&mut self, name: &str, from_block: usize) {
        if let Some(info) = self.entries.get_mut(name) {
            info.referenced_from.insert(from_block);
        }
    }

    /// Looks up the info for a name.
    pub fn get(&self, name: &str) -> Option<&FragmentInfo> {
        self.entries.get(name)
    }

    /// Returns the number assigned to a name, if mentioned.
    pub fn number_of(&self, name: &str) -> Option<usize> {
        self.entries.get(name).map(|i| i.number)
    }

    /// Iterates over names that were mentioned but never defined.
    pub fn undefined(&self) -> impl Iterator<Item = (&str, &FragmentInfo)> {
        self.entries
            .iter()
            .filter(|(_, info)| info.definition_count == 0)
            .map(|(name, info)| (name.as_str(), info))
    }

    /// Returns the number of known names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no name has been mentioned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
