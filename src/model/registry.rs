use slotmap::new_key_type;
use tracing::warn;

use crate::common::collections::HashMap;
use crate::sys::host::ElementId;

new_key_type! {
    pub struct ItemId;
    pub struct GridId;
}

/// Element to item lookup. Entries are relations, not ownership: the engine
/// adds one when an item is created and drops it when the item is destroyed.
#[derive(Debug, Default)]
pub struct ElementIndex {
    items: HashMap<ElementId, ItemId>,
}

impl ElementIndex {
    /// Fails if the element is already owned by a live item.
    pub fn insert(&mut self, element: ElementId, item: ItemId) -> Result<(), ItemId> {
        match self.items.get(&element) {
            Some(&owner) => Err(owner),
            None => {
                self.items.insert(element, item);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, element: ElementId, item: ItemId) {
        match self.items.get(&element) {
            Some(&owner) if owner == item => {
                self.items.remove(&element);
            }
            Some(&owner) => warn!(?element, ?item, ?owner, "Element owned by another item"),
            None => {}
        }
    }

    pub fn get(&self, element: ElementId) -> Option<ItemId> { self.items.get(&element).copied() }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}
