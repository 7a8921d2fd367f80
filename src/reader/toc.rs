//! Table of contents tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Indentation of each nested block, in pixels.
pub const INDENT_PX: u32 = 10;

/// One entry of a book's table of contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    /// Entry identifier from the navigation document (may be empty).
    #[serde(default)]
    pub id: String,
    /// Display text.
    pub label: String,
    /// Target location.
    pub href: String,
    /// Nested entries.
    #[serde(default)]
    pub subitems: Vec<NavItem>,
}

impl NavItem {
    /// Create a leaf entry.
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            label: label.into(),
            href: href.into(),
            subitems: Vec::new(),
        }
    }

    /// Attach nested entries.
    pub fn with_subitems(mut self, subitems: Vec<NavItem>) -> Self {
        self.subitems = subitems;
        self
    }
}

/// Href of the first top-level entry, if it has one.
pub fn first_href(toc: &[NavItem]) -> Option<&str> {
    toc.first()
        .map(|item| item.href.as_str())
        .filter(|href| !href.is_empty())
}

/// Stable identity of an entry: the index path from the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TocKey(Vec<usize>);

impl TocKey {
    fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        TocKey(path)
    }
}

impl fmt::Display for TocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

/// Renderable table of contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocNode {
    /// Stable key.
    pub key: TocKey,
    /// Button label.
    pub label: String,
    /// Location selected by clicking the entry.
    pub href: String,
    /// Nested entries, rendered inside an indented block.
    pub children: Vec<TocNode>,
}

/// Build the renderable tree. Depth is unbounded.
pub fn build_tree(toc: &[NavItem]) -> Vec<TocNode> {
    build_level(toc, &TocKey(Vec::new()))
}

fn build_level(items: &[NavItem], parent: &TocKey) -> Vec<TocNode> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let key = parent.child(i);
            TocNode {
                children: build_level(&item.subitems, &key),
                key,
                label: item.label.clone(),
                href: item.href.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<NavItem> {
        vec![
            NavItem::new("Part One", "part1.xhtml").with_subitems(vec![
                NavItem::new("Chapter 1", "ch1.xhtml"),
                NavItem::new("Chapter 2", "ch2.xhtml")
                    .with_subitems(vec![NavItem::new("Scene", "ch2.xhtml#scene")]),
            ]),
            NavItem::new("Part Two", "part2.xhtml"),
        ]
    }

    #[test]
    fn test_build_tree_keys() {
        let tree = build_tree(&sample());
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].key.to_string(), "0");

        let scene = &tree[0].children[1].children[0];
        assert_eq!(scene.key.to_string(), "0.1.0");
        assert_eq!(scene.href, "ch2.xhtml#scene");
        assert_eq!(tree[1].key.to_string(), "1");
    }

    #[test]
    fn test_deep_nesting_is_not_truncated() {
        let mut item = NavItem::new("leaf", "leaf.xhtml");
        for depth in 0..50 {
            item = NavItem::new(format!("level {}", depth), "x.xhtml").with_subitems(vec![item]);
        }
        let toc = vec![item];

        let mut node = &build_tree(&toc)[0];
        let mut depth = 0;
        while let Some(child) = node.children.first() {
            node = child;
            depth += 1;
        }
        assert_eq!(depth, 50);
        assert_eq!(node.label, "leaf");
    }

    #[test]
    fn test_first_href() {
        assert_eq!(first_href(&sample()), Some("part1.xhtml"));
        assert_eq!(first_href(&[]), None);
        assert_eq!(first_href(&[NavItem::new("Untitled", "")]), None);
    }
}
