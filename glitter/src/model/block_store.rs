//! The block store: canonical fragment name to accumulated block.

use indexmap::IndexMap;

use super::block::Block;
use super::name::{is_top_level, split_top_level};
use crate::errors::Result;
use crate::position::FilePos;

/// Maps canonical fragment names to their accumulated, finalised blocks.
///
/// Definitions with the same canonical name are concatenated in source
/// order; each later definition carries a line pragma at the join point.
/// The store is append-only while reading and read-only during expansion.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    blocks: IndexMap<String, Block>,
}

impl BlockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finalised block under a canonical name.
    ///
    /// The first definition is stored as-is. A later definition has
    /// `pragma(first line position)` prepended to its first line's text,
    /// then its lines joined onto the existing block.
    pub fn append<F>(&mut self, name: String, mut block: Block, pragma: F)
    where
        F: Fn(&FilePos) -> String,
    {
        match self.blocks.get_mut(&name) {
            Some(existing) => {
                if let Some(first) = block.lines.first_mut() {
                    first.text = format!("{}{}", pragma(&first.pos), first.text);
                }
                existing.lines.extend(block.lines);
            }
            None => {
                self.blocks.insert(name, block);
            }
        }
    }

    /// Looks up a block by canonical name.
    pub fn get(&self, name: &str) -> Option<&Block> {
        self.blocks.get(name)
    }

    /// Returns true if the name has been defined.
    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// Returns the number of stored names.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over all names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// Returns all top-level names sorted by `(filename, order)`.
    pub fn sorted_top_level(&self) -> Result<Vec<String>> {
        let mut keyed = Vec::new();
        for name in self.names().filter(|n| is_top_level(n)) {
            let (filename, order) = split_top_level(name)?;
            keyed.push((filename, order, name.to_string()));
        }
        keyed.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        Ok(keyed.into_iter().map(|(_, _, name)| name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::name::resolved_top_level;
    use crate::test_utils::block_of;

    fn no_pragma(_: &FilePos) -> String {
        String::new()
    }

    fn pragma(pos: &FilePos) -> String {
        format!("/*{}:{}*/", pos.filename, pos.lineno)
    }

    #[test]
    fn test_first_definition_stored() {
        let mut store = BlockStore::new();
        store.append("main".to_string(), block_of(&["x"]), no_pragma);
        assert!(store.contains("main"));
        assert_eq!(store.get("main").unwrap().len(), 1);
    }

    #[test]
    fn test_concatenation_in_source_order() {
        let mut store = BlockStore::new();
        store.append("a".to_string(), block_of(&["x"]), no_pragma);
        store.append("a".to_string(), block_of(&["y"]), no_pragma);

        let texts: Vec<_> = store
            .get("a")
            .unwrap()
            .lines
            .iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(texts, vec!["x", "y"]);
    }

    #[test]
    fn test_join_carries_pragma() {
        let mut store = BlockStore::new();
        store.append("a".to_string(), block_of(&["x"]), pragma);
        store.append("a".to_string(), block_of(&["y"]), pragma);

        let lines = &store.get("a").unwrap().lines;
        assert_eq!(lines[0].text, "x");
        assert_eq!(lines[1].text, "/*test.gw:1*/y");
    }

    #[test]
    fn test_empty_second_definition_is_a_no_op() {
        let mut store = BlockStore::new();
        store.append("a".to_string(), block_of(&["x"]), pragma);
        store.append("a".to_string(), Block::new(), pragma);
        assert_eq!(store.get("a").unwrap().len(), 1);
    }

    #[test]
    fn test_sorted_top_level() {
        let mut store = BlockStore::new();
        store.append(resolved_top_level("b.go", 0), block_of(&["3"]), no_pragma);
        store.append(resolved_top_level("a.go", 2), block_of(&["2"]), no_pragma);
        store.append(resolved_top_level("a.go", 1), block_of(&["1"]), no_pragma);
        store.append("helper".to_string(), block_of(&["h"]), no_pragma);

        let tops = store.sorted_top_level().unwrap();
        assert_eq!(
            tops,
            vec![
                resolved_top_level("a.go", 1),
                resolved_top_level("a.go", 2),
                resolved_top_level("b.go", 0),
            ]
        );
    }
}
