//! Path index module.
//!
//! Provides the `PathIndex` type, which flattens a derived schema into a
//! tree of field nodes keyed by `(field name, parent path)`. Every access
//! of the resolution surface is validated against this index.

use crate::error::TagError;
use crate::model::{Channel, FieldKind, Model};
use crate::path::{FieldPath, ROOT};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use serde_json::Value;
use std::collections::HashMap;

/// One field reachable from the derived schema.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Field name.
    pub id: String,
    /// Index key of the enclosing structure (`__root__.my_tag`).
    pub path: String,
    /// Full path of the field itself.
    pub field_path: FieldPath,
    pub kind: FieldKind,
    pub default: Option<Value>,
    /// Set when the field was derived by the schema adapter.
    pub channel: Option<Channel>,
}

/// A tree of schema fields, root marker at the top.
///
/// Nodes are inserted depth-first in declaration order, so node order
/// is a pre-order walk of the schema. Edges run from a structure to each
/// of its fields.
///
/// # Examples
///
/// ```rust
/// use zztag::index::PathIndex;
/// use zztag::model::{FieldDescriptor, Model};
/// use zztag::FieldPath;
///
/// let model = Model::new().field(
///     "my_tag",
///     FieldDescriptor::structure(Model::new().field("nbr", FieldDescriptor::number())),
/// );
/// let index = PathIndex::build(&model).unwrap();
///
/// assert!(index.lookup("nbr", "__root__.my_tag").is_some());
/// assert!(index.lookup("nbr", "__root__").is_none());
/// assert!(index.entry(&FieldPath::parse("my_tag.gold")).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct PathIndex {
    graph: DiGraph<IndexEntry, ()>,
    root: NodeIndex,
    node_map: HashMap<(String, String), NodeIndex>,
}

impl PathIndex {
    /// Build the index of a (derived) model by a depth-first walk.
    ///
    /// Fails with `InvalidModel` if two fields share the same
    /// `(name, parent path)` pair.
    pub fn build(model: &Model) -> Result<Self, TagError> {
        let mut graph = DiGraph::new();
        let root = graph.add_node(IndexEntry {
            id: ROOT.to_string(),
            path: String::new(),
            field_path: FieldPath::root(),
            kind: FieldKind::Structure,
            default: None,
            channel: None,
        });

        let mut index = Self {
            graph,
            root,
            node_map: HashMap::new(),
        };
        index.walk(root, &FieldPath::root(), model)?;
        Ok(index)
    }

    fn walk(&mut self, parent: NodeIndex, parent_path: &FieldPath, model: &Model) -> Result<(), TagError> {
        for (name, desc) in model.fields() {
            let field_path = parent_path.child(name);
            let key = (name.to_string(), parent_path.key());
            if self.node_map.contains_key(&key) {
                return Err(TagError::invalid_model(field_path.dotted(), "declared twice"));
            }

            let idx = self.graph.add_node(IndexEntry {
                id: name.to_string(),
                path: key.1.clone(),
                field_path: field_path.clone(),
                kind: desc.kind,
                default: desc.default.clone(),
                channel: desc.channel,
            });
            self.graph.add_edge(parent, idx, ());
            self.node_map.insert(key, idx);

            if let Some(nested) = &desc.fields {
                self.walk(idx, &field_path, nested)?;
            }
        }
        Ok(())
    }

    /// Find the entry for `id` under the parent index key `path`.
    pub fn lookup(&self, id: &str, path: &str) -> Option<&IndexEntry> {
        self.node_map
            .get(&(id.to_string(), path.to_string()))
            .map(|&idx| &self.graph[idx])
    }

    /// Validate one segment below `parent`.
    pub fn resolve(&self, id: &str, parent: &FieldPath) -> Result<&IndexEntry, TagError> {
        let path = parent.key();
        self.lookup(id, &path)
            .ok_or_else(|| TagError::PathNotFound { id: id.to_string(), path })
    }

    /// Validate every segment of `path` and return the entry of the last one.
    ///
    /// The root path yields the root marker entry.
    pub fn entry(&self, path: &FieldPath) -> Result<&IndexEntry, TagError> {
        let mut current = &self.graph[self.root];
        let mut parent = FieldPath::root();
        for segment in path.segments() {
            current = self.resolve(segment, &parent)?;
            parent = current.field_path.clone();
        }
        Ok(current)
    }

    /// Fields declared directly under `parent`, in declaration order.
    pub fn children(&self, parent: &FieldPath) -> Result<Vec<&IndexEntry>, TagError> {
        let node = self.node_of(parent)?;
        let mut nodes: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        nodes.sort();
        Ok(nodes.into_iter().map(|idx| &self.graph[idx]).collect())
    }

    /// Author-declared leaf fields anywhere beneath `parent`, in pre-order.
    pub fn leaves(&self, parent: &FieldPath) -> Result<Vec<&IndexEntry>, TagError> {
        let start = self.node_of(parent)?;
        let mut dfs = Dfs::new(&self.graph, start);
        let mut nodes = Vec::new();
        while let Some(idx) = dfs.next(&self.graph) {
            let entry = &self.graph[idx];
            if idx != start && entry.kind.is_leaf() && entry.channel.is_none() {
                nodes.push(idx);
            }
        }
        nodes.sort();
        Ok(nodes.into_iter().map(|idx| &self.graph[idx]).collect())
    }

    /// Every entry except the root marker, in pre-order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.graph
            .node_indices()
            .filter(move |&idx| idx != self.root)
            .map(move |idx| &self.graph[idx])
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    fn node_of(&self, path: &FieldPath) -> Result<NodeIndex, TagError> {
        if path.is_root() {
            return Ok(self.root);
        }
        let entry = self.entry(path)?;
        self.node_map
            .get(&(entry.id.clone(), entry.path.clone()))
            .copied()
            .ok_or_else(|| TagError::PathNotFound {
                id: entry.id.clone(),
                path: entry.path.clone(),
            })
    }
}
