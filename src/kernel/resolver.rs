//! Subtree Identifier Resolver.
//!
//! Turns a DOM node into a stable, human-readable label used to group
//! mutations and shifts by origin. Labels prefer, in order: the node's id
//! (`#feed`), the designated test attribute (`[data-testid="cart"]`), then
//! tag plus first class (`li.item`). A node that is not itself anchored by an
//! id or test attribute is prefixed with its nearest anchored ancestor within
//! the depth bound (`#feed > li.item`).
//!
//! Resolution never fails. A node with nothing usable resolves to its tag.

use std::collections::HashMap;

use super::event::{NodeHandle, RawNode};

pub const DEFAULT_TEST_ATTRIBUTE: &str = "data-testid";
pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Debug, Clone)]
struct CachedPath {
    path: String,
    /// Every node the walk touched. Removing any of them invalidates the path.
    chain: Vec<NodeHandle>,
}

#[derive(Debug, Clone)]
pub struct SubtreeResolver {
    test_attribute: String,
    max_depth: usize,
    cache: HashMap<NodeHandle, CachedPath>,
    // Node -> cached entries whose chain contains it. Holds only live cache entries.
    dependents: HashMap<NodeHandle, Vec<NodeHandle>>,
}

impl Default for SubtreeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_ATTRIBUTE, DEFAULT_MAX_DEPTH)
    }
}

impl SubtreeResolver {
    pub fn new(test_attribute: &str, max_depth: usize) -> Self {
        Self {
            test_attribute: test_attribute.to_string(),
            max_depth,
            cache: HashMap::new(),
            dependents: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, node: &RawNode) -> String {
        if let Some(cached) = self.cache.get(&node.handle) {
            return cached.path.clone();
        }

        let resolved = self.walk(node);
        let path = resolved.path.clone();
        for link in &resolved.chain {
            self.dependents.entry(*link).or_default().push(node.handle);
        }
        self.cache.insert(node.handle, resolved);
        path
    }

    /// Records that `node` left the DOM. Paths derived through it are dropped,
    /// so a node that later takes over the same id resolves afresh.
    pub fn forget(&mut self, node: &RawNode) {
        let Some(dependents) = self.dependents.remove(&node.handle) else {
            return;
        };
        for dependent in dependents {
            let Some(cached) = self.cache.remove(&dependent) else {
                continue;
            };
            for link in cached.chain.iter().filter(|h| **h != node.handle) {
                if let Some(entries) = self.dependents.get_mut(link) {
                    entries.retain(|d| *d != dependent);
                    if entries.is_empty() {
                        self.dependents.remove(link);
                    }
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.dependents.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Distinct nodes referenced by any cached path.
    pub fn indexed_len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_cached(&self, handle: NodeHandle) -> bool {
        self.cache.contains_key(&handle)
    }

    fn walk(&self, node: &RawNode) -> CachedPath {
        let own = self.label(node);
        let mut chain = vec![node.handle];

        if self.anchor_label(node).is_some() {
            return CachedPath { path: own, chain };
        }

        for ancestor in node.ancestors().take(self.max_depth) {
            chain.push(ancestor.handle);
            if let Some(anchor) = self.anchor_label(ancestor) {
                return CachedPath {
                    path: format!("{} > {}", anchor, own),
                    chain,
                };
            }
        }

        CachedPath { path: own, chain }
    }

    fn anchor_label(&self, node: &RawNode) -> Option<String> {
        if let Some(id) = node.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return Some(format!("#{}", id));
        }
        node.attributes
            .get(&self.test_attribute)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| format!("[{}=\"{}\"]", self.test_attribute, v))
    }

    fn label(&self, node: &RawNode) -> String {
        if let Some(anchor) = self.anchor_label(node) {
            return anchor;
        }
        let tag = tag_name(node);
        match node.classes.iter().map(|c| c.trim()).find(|c| !c.is_empty()) {
            Some(class) => format!("{}.{}", tag, class),
            None => tag,
        }
    }
}

fn tag_name(node: &RawNode) -> String {
    let tag = node.tag.trim();
    if tag.is_empty() {
        "node".to_string()
    } else {
        tag.to_ascii_lowercase()
    }
}
