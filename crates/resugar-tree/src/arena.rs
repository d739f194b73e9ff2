// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Arena-backed mutable syntax tree.
//!
//! Nodes are addressed by stable [`NodeId`] indices into an [`Arena`].
//! Detaching a node removes it from its parent's child list but leaves it
//! valid in the arena, so rewrite passes can detach a subtree, inspect it,
//! and re-insert it (or harvest its provenance) without lifetime gymnastics.
//!
//! # Invariants
//!
//! - A node has at most one parent at a time.
//! - A node must be detached before it is inserted elsewhere; attaching an
//!   already-attached node is a programming error and panics.
//! - Nodes are never freed. A detached node simply has no parent.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::kind::{Annotation, Literal, NodeKind, Role};
use crate::provenance::ProvenanceSet;

/// Stable index of a node in an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A role-tagged child slot entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Child {
    pub role: Role,
    pub id: NodeId,
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<Child>,
    provenance: ProvenanceSet,
    annotations: Vec<Annotation>,
}

/// Owner of all nodes in one tree (or forest).
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<NodeData>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    /// Number of nodes ever allocated (detached nodes included).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a new, detached node.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("arena overflow"));
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            provenance: ProvenanceSet::new(),
            annotations: Vec::new(),
        });
        id
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[Child] {
        &self.nodes[id.index()].children
    }

    /// First child in the given role, if any.
    pub fn child(&self, id: NodeId, role: Role) -> Option<NodeId> {
        self.nodes[id.index()]
            .children
            .iter()
            .find(|c| c.role == role)
            .map(|c| c.id)
    }

    /// All children in the given role, in order.
    pub fn children_with_role(&self, id: NodeId, role: Role) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.index()]
            .children
            .iter()
            .filter(move |c| c.role == role)
            .map(|c| c.id)
    }

    /// The role this node occupies in its parent, if attached.
    pub fn role_of(&self, id: NodeId) -> Option<Role> {
        let parent = self.parent(id)?;
        self.children(parent)
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.role)
    }

    fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let pos = self.children(parent).iter().position(|c| c.id == id)?;
        Some((parent, pos))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, pos) = self.index_in_parent(id)?;
        self.children(parent).get(pos + 1).map(|c| c.id)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, pos) = self.index_in_parent(id)?;
        pos.checked_sub(1)
            .and_then(|p| self.children(parent).get(p))
            .map(|c| c.id)
    }

    /// Pre-order listing of a subtree, root included.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(child.id);
            }
        }
        out
    }

    /// True if `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    // ------------------------------------------------------------------
    // Surgery
    // ------------------------------------------------------------------

    /// Detach a node from its parent. No-op if already detached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some((parent, pos)) = self.index_in_parent(id) {
            trace!(node = %id, from = %parent, "detach");
            self.nodes[parent.index()].children.remove(pos);
            self.nodes[id.index()].parent = None;
        }
    }

    fn assert_attachable(&self, parent: NodeId, child: NodeId) {
        assert!(
            self.nodes[child.index()].parent.is_none(),
            "node {child} is already attached; detach it first"
        );
        assert!(
            !self.is_ancestor_of(child, parent),
            "attaching {child} under {parent} would create a cycle"
        );
    }

    /// Append `child` as the last child of `parent` in `role`.
    pub fn append_child(&mut self, parent: NodeId, role: Role, child: NodeId) {
        self.assert_attachable(parent, child);
        self.nodes[parent.index()].children.push(Child { role, id: child });
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Prepend `child` as the first child of `parent` in `role`.
    pub fn prepend_child(&mut self, parent: NodeId, role: Role, child: NodeId) {
        self.assert_attachable(parent, child);
        self.nodes[parent.index()]
            .children
            .insert(0, Child { role, id: child });
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Insert `new` immediately before `anchor`, under the same parent.
    pub fn insert_before(&mut self, anchor: NodeId, role: Role, new: NodeId) {
        let (parent, pos) = self
            .index_in_parent(anchor)
            .unwrap_or_else(|| panic!("insert_before: anchor {anchor} is detached"));
        self.assert_attachable(parent, new);
        self.nodes[parent.index()]
            .children
            .insert(pos, Child { role, id: new });
        self.nodes[new.index()].parent = Some(parent);
    }

    /// Insert `new` immediately after `anchor`, under the same parent.
    pub fn insert_after(&mut self, anchor: NodeId, role: Role, new: NodeId) {
        let (parent, pos) = self
            .index_in_parent(anchor)
            .unwrap_or_else(|| panic!("insert_after: anchor {anchor} is detached"));
        self.assert_attachable(parent, new);
        self.nodes[parent.index()]
            .children
            .insert(pos + 1, Child { role, id: new });
        self.nodes[new.index()].parent = Some(parent);
    }

    /// Replace `old` with `new` in `old`'s slot (same role, same position).
    /// `old` becomes detached; `new` must be detached beforehand.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let (parent, pos) = self
            .index_in_parent(old)
            .unwrap_or_else(|| panic!("replace: node {old} is detached"));
        self.assert_attachable(parent, new);
        trace!(old = %old, new = %new, parent = %parent, "replace");
        let role = self.nodes[parent.index()].children[pos].role;
        self.nodes[parent.index()].children[pos] = Child { role, id: new };
        self.nodes[old.index()].parent = None;
        self.nodes[new.index()].parent = Some(parent);
    }

    /// Deep-copy a subtree. The clone is detached, carries the original's
    /// kinds and annotations, and has empty provenance (ranges must not be
    /// duplicated; they stay with the original).
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.kind(id).clone();
        let clone = self.alloc(kind);
        self.copy_annotations(id, clone);
        let children: Vec<Child> = self.children(id).to_vec();
        for child in children {
            let child_clone = self.clone_subtree(child.id);
            self.append_child(clone, child.role, child_clone);
        }
        clone
    }

    // ------------------------------------------------------------------
    // Provenance and annotations
    // ------------------------------------------------------------------

    pub fn provenance(&self, id: NodeId) -> &ProvenanceSet {
        &self.nodes[id.index()].provenance
    }

    pub fn provenance_mut(&mut self, id: NodeId) -> &mut ProvenanceSet {
        &mut self.nodes[id.index()].provenance
    }

    /// Move the ranges attached to `from` (only that node, not its subtree)
    /// into `to`'s provenance set.
    pub fn merge_provenance_into(&mut self, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        let taken = self.nodes[from.index()].provenance.take();
        self.nodes[to.index()].provenance.merge(&taken);
    }

    /// Move every range attached anywhere in `subtree` into `into`.
    ///
    /// Used when surgery consumes a subtree with no surviving equivalent:
    /// the union of the consumed provenance is reattached to the carrier
    /// node so no instruction range is dropped.
    pub fn absorb_subtree_provenance(&mut self, subtree: NodeId, into: NodeId) {
        assert!(
            !self.is_ancestor_of(subtree, into),
            "provenance carrier {into} lies inside the absorbed subtree {subtree}"
        );
        let mut union = ProvenanceSet::new();
        for id in self.descendants(subtree) {
            union.merge(&self.nodes[id.index()].provenance.take());
        }
        self.nodes[into.index()].provenance.merge(&union);
    }

    /// Union of all provenance reachable from `root` (conservation checks).
    pub fn collect_provenance(&self, root: NodeId) -> ProvenanceSet {
        let mut union = ProvenanceSet::new();
        for id in self.descendants(root) {
            union.merge(&self.nodes[id.index()].provenance);
        }
        union
    }

    pub fn annotations(&self, id: NodeId) -> &[Annotation] {
        &self.nodes[id.index()].annotations
    }

    pub fn add_annotation(&mut self, id: NodeId, annotation: Annotation) {
        self.nodes[id.index()].annotations.push(annotation);
    }

    /// Copy all annotations from `from` onto `to`.
    pub fn copy_annotations(&mut self, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        let copied = self.nodes[from.index()].annotations.clone();
        self.nodes[to.index()].annotations.extend(copied);
    }

    // ------------------------------------------------------------------
    // Structure comparison and dumping
    // ------------------------------------------------------------------

    /// Deep structural equality: same variants, same payloads, same roles,
    /// same child shapes. Provenance and annotations are not compared.
    pub fn structurally_equal(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        if self.kind(a) != self.kind(b) {
            return false;
        }
        let ca = self.children(a);
        let cb = self.children(b);
        ca.len() == cb.len()
            && ca
                .iter()
                .zip(cb.iter())
                .all(|(x, y)| x.role == y.role && self.structurally_equal(x.id, y.id))
    }

    /// Compact s-expression rendering of a subtree, for diagnostics and
    /// test assertions. This is not a source formatter.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(id, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, out: &mut String) {
        use std::fmt::Write;
        out.push('(');
        out.push_str(self.kind(id).name());
        match self.kind(id) {
            NodeKind::Identifier { name }
            | NodeKind::VariableDeclaration { name, .. }
            | NodeKind::Foreach { item: name, .. }
            | NodeKind::TypeDeclaration { name }
            | NodeKind::MethodDeclaration { name }
            | NodeKind::FieldDeclaration { name, .. }
            | NodeKind::PropertyDeclaration { name, .. }
            | NodeKind::EventDeclaration { name, .. }
            | NodeKind::Parameter { name, .. } => {
                let _ = write!(out, " {name}");
            }
            NodeKind::MemberAccess { member } => {
                let _ = write!(out, " .{member}");
            }
            NodeKind::ObjectCreation { ty } | NodeKind::Cast { ty } | NodeKind::TypeRef { ty } => {
                let _ = write!(out, " {ty}");
            }
            NodeKind::Literal { value } | NodeKind::CaseLabel { value: Some(value) } => {
                match value {
                    Literal::Null => out.push_str(" null"),
                    Literal::Bool(b) => {
                        let _ = write!(out, " {b}");
                    }
                    Literal::Int(i) => {
                        let _ = write!(out, " {i}");
                    }
                    Literal::Str(s) => {
                        let _ = write!(out, " {s:?}");
                    }
                    Literal::Decimal { text, .. } => {
                        let _ = write!(out, " {text}m");
                    }
                }
            }
            NodeKind::CaseLabel { value: None } => out.push_str(" default"),
            NodeKind::BinaryOp { op } => {
                let _ = write!(out, " {op:?}");
            }
            NodeKind::UnaryOp { op } => {
                let _ = write!(out, " {op:?}");
            }
            NodeKind::Accessor { kind } => {
                let _ = write!(out, " {kind:?}");
            }
            _ => {}
        }
        for child in self.children(id) {
            out.push(' ');
            out.push_str(child.role.as_str());
            out.push(':');
            self.dump_into(child.id, out);
        }
        out.push(')');
    }
}
