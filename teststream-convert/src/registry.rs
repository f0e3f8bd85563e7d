// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run-scoped registries for tests and groups.
//!
//! The runner's stream is flat: full definitions arrive once, and later
//! events refer back by id. The registries rebuild the implicit forest from
//! those records. Parent links are stored as id references resolved through
//! the group arena, never as owning pointers, so entries can be dropped en
//! masse at run boundaries.

use indexmap::IndexMap;
use teststream_events::{GroupDef, Metadata, TestDef};

/// Name rendered for anonymous (artificial) entries.
pub(crate) const NO_NAME: &str = "<no name>";

/// A registered test or group.
///
/// Ids are unique within a kind but the numeric spaces may overlap, so an
/// `Item` is only meaningful together with the arena it came from.
#[derive(Clone, Debug)]
pub(crate) struct Item {
    id: u32,
    name: Option<String>,
    parent_id: Option<u32>,
    metadata: Metadata,
}

impl Item {
    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    /// The full hierarchical name, with the anonymous sentinel substituted.
    pub(crate) fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(NO_NAME)
    }

    /// An artificial item carries no real name and is used only for
    /// parent-chain plumbing; it must never be reported downstream.
    pub(crate) fn is_artificial(&self) -> bool {
        self.name.is_none()
    }

    pub(crate) fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// The two id-keyed arenas for one run.
///
/// Insertion order is preserved, which makes the end-of-run group
/// finalization pass deterministic.
#[derive(Clone, Debug, Default)]
pub(crate) struct EntityRegistry {
    tests: IndexMap<u32, Item>,
    groups: IndexMap<u32, Item>,
}

impl EntityRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Upserts a test from its full definition, resolving the innermost
    /// entry of its group-id list as the parent. A parent id not yet defined
    /// resolves to no parent, permanently.
    pub(crate) fn insert_test(&mut self, def: &TestDef) -> u32 {
        let parent_id = def
            .group_ids
            .last()
            .copied()
            .filter(|id| self.groups.contains_key(id));
        self.tests.insert(
            def.id,
            Item {
                id: def.id,
                name: def.name.clone(),
                parent_id,
                metadata: def.metadata.clone(),
            },
        );
        def.id
    }

    /// Upserts a group from its full definition.
    pub(crate) fn insert_group(&mut self, def: &GroupDef) -> u32 {
        let parent_id = def
            .parent_id
            // A group cannot be its own ancestor; a self-referencing
            // definition resolves to no parent.
            .filter(|id| *id != def.id && self.groups.contains_key(id));
        self.groups.insert(
            def.id,
            Item {
                id: def.id,
                name: def.name.clone(),
                parent_id,
                metadata: def.metadata.clone(),
            },
        );
        def.id
    }

    pub(crate) fn test(&self, id: u32) -> Option<&Item> {
        self.tests.get(&id)
    }

    pub(crate) fn group(&self, id: u32) -> Option<&Item> {
        self.groups.get(&id)
    }

    /// All known groups, in insertion order.
    pub(crate) fn groups(&self) -> impl Iterator<Item = &Item> {
        self.groups.values()
    }

    /// Drops every entry; used at run boundaries.
    pub(crate) fn clear(&mut self) {
        self.tests.clear();
        self.groups.clear();
    }

    /// The item's parent, if it exists and is not artificial.
    pub(crate) fn valid_parent(&self, item: &Item) -> Option<&Item> {
        let parent = item.parent_id.and_then(|id| self.groups.get(&id))?;
        (!parent.is_artificial()).then_some(parent)
    }

    pub(crate) fn has_valid_parent(&self, item: &Item) -> bool {
        self.valid_parent(item).is_some()
    }

    /// The valid parent's id, or 0 (the reserved "no parent" sentinel).
    pub(crate) fn valid_parent_id(&self, item: &Item) -> u32 {
        self.valid_parent(item).map_or(0, Item::id)
    }

    /// The item's name with the parent's full name and one separator
    /// character stripped. Falls back to the full name when there is no
    /// valid parent or the parent's name is not actually a prefix.
    pub(crate) fn base_name<'a>(&self, item: &'a Item) -> &'a str {
        let name = item.display_name();
        if let Some(parent) = self.valid_parent(item) {
            let stripped = name.strip_prefix(parent.display_name()).and_then(|rest| {
                let mut chars = rest.chars();
                chars.next().map(|_| chars.as_str())
            });
            if let Some(stripped) = stripped {
                return stripped;
            }
        }
        name
    }

    /// The base names of the item's ancestor chain, root first, ending with
    /// the item's own base name. An item with no valid parent contributes
    /// nothing, so a chain root never appears in the list.
    pub(crate) fn name_list(&self, item: &Item) -> Vec<String> {
        let mut chain: Vec<&Item> = Vec::new();
        let mut current = item;
        while self.has_valid_parent(current) {
            chain.push(current);
            let parent = self
                .valid_parent(current)
                .expect("has_valid_parent checked above");
            // Parent ids normally point strictly toward already-created
            // ancestors; a redefinition could still introduce a cycle.
            if chain.iter().any(|seen| std::ptr::eq(*seen, parent)) {
                break;
            }
            current = parent;
        }
        chain
            .iter()
            .rev()
            .map(|item| self.base_name(item).to_owned())
            .collect()
    }
}
