//! Validation for drag-and-drop hierarchy reorganizations.
//!
//! A move is checked against the stored hierarchy with every pending
//! (not yet saved) move layered on top: for any node with a pending move,
//! the latest move's new parent replaces the stored parent for the walk.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Deepest level a node may sit at; roots are level 1.
pub const MAX_HIERARCHY_DEPTH: usize = 10;

/// Depths this close to the limit produce a warning.
pub const DEPTH_WARNING_MARGIN: usize = 2;

/// Moving a subtree with more descendants than this produces a warning.
pub const LARGE_SUBTREE_THRESHOLD: usize = 20;

/// A stored hierarchy node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgNode {
    pub key: String,
    pub parent_key: Option<String>,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl OrgNode {
    pub fn new(key: impl Into<String>, parent_key: Option<&str>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            parent_key: parent_key.map(str::to_string),
            is_active: true,
        }
    }
}

/// An uncommitted reparenting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMove {
    pub node_key: String,
    pub old_parent_key: Option<String>,
    pub new_parent_key: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveIssueKind {
    NodeNotFound,
    SelfParent,
    ParentNotFound,
    InactiveParent,
    CircularReference,
    DepthExceeded,
    NearDepthLimit,
    LargeSubtree,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIssue {
    pub kind: MoveIssueKind,
    pub message: String,
}

impl MoveIssue {
    fn new(kind: MoveIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of validating one move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveValidation {
    pub is_valid: bool,
    pub errors: Vec<MoveIssue>,
    pub warnings: Vec<MoveIssue>,
}

impl MoveValidation {
    fn reject(error: MoveIssue, warnings: Vec<MoveIssue>) -> Self {
        Self {
            is_valid: false,
            errors: vec![error],
            warnings,
        }
    }

    fn accept(warnings: Vec<MoveIssue>) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings,
        }
    }

    pub fn has_error(&self, kind: MoveIssueKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn has_warning(&self, kind: MoveIssueKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// A pending move that failed validation, with its reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidMove {
    pub pending_move: PendingMove,
    pub errors: Vec<MoveIssue>,
}

// ---------------------------------------------------------------------------
// Effective hierarchy
// ---------------------------------------------------------------------------

/// Parent overrides from pending moves. When a node has several moves the
/// one with the latest timestamp wins; ties go to the later entry.
pub fn pending_parent_overrides(moves: &[PendingMove]) -> HashMap<&str, Option<&str>> {
    let mut latest: HashMap<&str, &PendingMove> = HashMap::new();
    for m in moves {
        let replace = latest
            .get(m.node_key.as_str())
            .map_or(true, |current| m.timestamp >= current.timestamp);
        if replace {
            latest.insert(m.node_key.as_str(), m);
        }
    }
    latest
        .into_iter()
        .map(|(key, m)| (key, m.new_parent_key.as_deref()))
        .collect()
}

/// Stored nodes with pending overrides consulted first.
struct Hierarchy<'a> {
    nodes: HashMap<&'a str, &'a OrgNode>,
    overrides: HashMap<&'a str, Option<&'a str>>,
}

impl<'a> Hierarchy<'a> {
    fn new(nodes: &'a [OrgNode], pending: &'a [PendingMove]) -> Self {
        let mut by_key = HashMap::with_capacity(nodes.len());
        for node in nodes {
            by_key.entry(node.key.as_str()).or_insert(node);
        }
        Self {
            nodes: by_key,
            overrides: pending_parent_overrides(pending),
        }
    }

    fn get(&self, key: &str) -> Option<&'a OrgNode> {
        self.nodes.get(key).copied()
    }

    fn parent_of(&self, key: &str) -> Option<&'a str> {
        match self.overrides.get(key) {
            Some(parent) => *parent,
            None => self.get(key).and_then(|n| n.parent_key.as_deref()),
        }
    }

    /// Ancestors of `key`, nearest first. Stops at a root, at an unknown
    /// key, or when a loop in the stored data repeats a key.
    fn ancestors(&self, key: &'a str) -> Vec<&'a str> {
        let mut seen: HashSet<&str> = HashSet::from([key]);
        let mut chain = Vec::new();
        let mut current = key;
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            if !self.nodes.contains_key(parent) {
                break;
            }
            current = parent;
        }
        chain
    }

    /// Level of `key` with roots at 1.
    fn depth(&self, key: &'a str) -> usize {
        self.ancestors(key).len() + 1
    }

    /// Descendant count and the deepest descendant's level relative to
    /// `key` (0 for a leaf).
    fn subtree_extent(&self, key: &'a str) -> (usize, usize) {
        let mut children: HashMap<&str, Vec<&'a str>> = HashMap::new();
        for &child in self.nodes.keys() {
            if let Some(parent) = self.parent_of(child) {
                children.entry(parent).or_default().push(child);
            }
        }

        let mut seen: HashSet<&str> = HashSet::from([key]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(key, 0)]);
        let mut count = 0;
        let mut max_relative = 0;
        while let Some((current, level)) = queue.pop_front() {
            max_relative = max_relative.max(level);
            for &child in children.get(current).into_iter().flatten() {
                if seen.insert(child) {
                    count += 1;
                    queue.push_back((child, level + 1));
                }
            }
        }
        (count, max_relative)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate moving `node_key` under `new_parent_key` (`None` makes it a
/// root).
///
/// Rules run in order and stop at the first error: the node exists, it is
/// not its own parent, the parent exists, the parent is not a descendant,
/// and the deepest descendant stays within [`MAX_HIERARCHY_DEPTH`].
/// Warnings collected before an error are kept.
pub fn validate_move(
    node_key: &str,
    new_parent_key: Option<&str>,
    all_nodes: &[OrgNode],
    pending_moves: &[PendingMove],
) -> MoveValidation {
    let hierarchy = Hierarchy::new(all_nodes, pending_moves);
    let mut warnings = Vec::new();

    let Some(node) = hierarchy.get(node_key) else {
        return MoveValidation::reject(
            MoveIssue::new(
                MoveIssueKind::NodeNotFound,
                format!("'{node_key}' does not exist"),
            ),
            warnings,
        );
    };
    let node_key = node.key.as_str();

    if new_parent_key == Some(node_key) {
        return MoveValidation::reject(
            MoveIssue::new(
                MoveIssueKind::SelfParent,
                format!("'{node_key}' cannot be its own parent"),
            ),
            warnings,
        );
    }

    let new_depth = match new_parent_key {
        None => 1,
        Some(parent_key) => {
            let Some(parent) = hierarchy.get(parent_key) else {
                return MoveValidation::reject(
                    MoveIssue::new(
                        MoveIssueKind::ParentNotFound,
                        format!("New parent '{parent_key}' does not exist"),
                    ),
                    warnings,
                );
            };
            if !parent.is_active {
                warnings.push(MoveIssue::new(
                    MoveIssueKind::InactiveParent,
                    format!("'{}' is inactive", parent.name),
                ));
            }

            let parent_key = parent.key.as_str();
            let ancestors = hierarchy.ancestors(parent_key);
            if let Some(pos) = ancestors.iter().position(|&k| k == node_key) {
                let mut path: Vec<&str> = vec![parent_key];
                path.extend(&ancestors[..=pos]);
                return MoveValidation::reject(
                    MoveIssue::new(
                        MoveIssueKind::CircularReference,
                        format!(
                            "Moving '{node_key}' under '{parent_key}' would create a loop: {} → {node_key}",
                            path.iter().rev().copied().collect::<Vec<_>>().join(" → ")
                        ),
                    ),
                    warnings,
                );
            }
            ancestors.len() + 2
        }
    };

    if hierarchy.parent_of(node_key) == new_parent_key {
        warnings.push(MoveIssue::new(
            MoveIssueKind::Unchanged,
            format!("'{node_key}' already sits under that parent"),
        ));
    }

    let (descendants, max_relative) = hierarchy.subtree_extent(node_key);
    let deepest = new_depth + max_relative;
    if deepest > MAX_HIERARCHY_DEPTH {
        return MoveValidation::reject(
            MoveIssue::new(
                MoveIssueKind::DepthExceeded,
                format!(
                    "Move would put part of the hierarchy at depth {deepest} (maximum is {MAX_HIERARCHY_DEPTH})"
                ),
            ),
            warnings,
        );
    }
    if deepest >= MAX_HIERARCHY_DEPTH - DEPTH_WARNING_MARGIN {
        warnings.push(MoveIssue::new(
            MoveIssueKind::NearDepthLimit,
            format!("Hierarchy would reach depth {deepest} of {MAX_HIERARCHY_DEPTH}"),
        ));
    }

    if descendants > LARGE_SUBTREE_THRESHOLD {
        warnings.push(MoveIssue::new(
            MoveIssueKind::LargeSubtree,
            format!("'{node_key}' has {descendants} descendants; all of them move with it"),
        ));
    }

    MoveValidation::accept(warnings)
}

/// Validate every pending move with the whole pending set visible.
///
/// Returns the moves that fail; the set is safe to commit only when the
/// result is empty.
pub fn validate_all_pending_moves(moves: &[PendingMove], all_nodes: &[OrgNode]) -> Vec<InvalidMove> {
    moves
        .iter()
        .filter_map(|m| {
            let validation =
                validate_move(&m.node_key, m.new_parent_key.as_deref(), all_nodes, moves);
            (!validation.is_valid).then(|| InvalidMove {
                pending_move: m.clone(),
                errors: validation.errors,
            })
        })
        .collect()
}

/// Depth of `key` with pending moves applied (roots are level 1), or
/// `None` for an unknown key.
pub fn effective_depth(key: &str, all_nodes: &[OrgNode], pending_moves: &[PendingMove]) -> Option<usize> {
    let hierarchy = Hierarchy::new(all_nodes, pending_moves);
    let node = hierarchy.get(key)?;
    Some(hierarchy.depth(node.key.as_str()))
}
