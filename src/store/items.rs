//! Ordered item catalogs backing discrete variables.
use serde::{Deserialize, Serialize};

/// One choice of a discrete variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable sort key, also accepted as a legacy alias for some variables.
    pub sort: String,
    pub name: String,
    pub desc: String,
    /// Numeric data index handed to equations and stored in result tables.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemList {
    pub name: String,
    pub items: Vec<Item>,
}

impl ItemList {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), items: Vec::new() }
    }

    /// Appends an item whose data index equals its catalog position.
    pub fn with_item(mut self, sort: &str, name: &str, desc: &str) -> Self {
        let index = self.items.len();
        self.items.push(Item { sort: sort.into(), name: name.into(), desc: desc.into(), index });
        self
    }

    /// Appends an item with an explicit data index.
    pub fn with_indexed_item(mut self, sort: &str, name: &str, desc: &str, index: usize) -> Self {
        self.items.push(Item { sort: sort.into(), name: name.into(), desc: desc.into(), index });
        self
    }

    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Catalog position of the item with this name.
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|it| it.name == name)
    }

    /// Catalog position of the item with this sort key.
    pub fn position_by_sort(&self, sort: &str) -> Option<usize> {
        self.items.iter().position(|it| it.sort == sort)
    }

    /// Catalog position of the item with this data index.
    pub fn position_by_index(&self, index: usize) -> Option<usize> {
        self.items.iter().position(|it| it.index == index)
    }

    /// Largest data index in the list, used to size per-item tables.
    pub fn max_index(&self) -> Option<usize> {
        self.items.iter().map(|it| it.index).max()
    }

    pub fn get(&self, position: usize) -> Option<&Item> { self.items.get(position) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_sort_and_index() {
        let list = ItemList::new("FuelModels")
            .with_indexed_item("001", "sh1", "Low load, dry climate shrub", 7)
            .with_indexed_item("002", "gr2", "Low load, dry climate grass", 3);

        assert_eq!(list.position_by_name("gr2"), Some(1));
        assert_eq!(list.position_by_sort("001"), Some(0));
        assert_eq!(list.position_by_index(3), Some(1));
        assert_eq!(list.position_by_index(0), None);
        assert_eq!(list.max_index(), Some(7));
    }
}
