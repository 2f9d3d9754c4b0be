// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Lazily populated model of the server address space.
//!
//! The tree is an arena of [`TreeEntry`] records keyed by [`NodeKey`]. A
//! parent owns its children through key lists; nothing holds a session,
//! every fetch borrows the current one from the [`SessionManager`].
//!
//! # Fetch state machine
//!
//! ```text
//!                 get_children()              browse ok
//! ┌────────────┐ ──────────────► ┌──────────┐ ─────────► ┌──────────┐
//! │ Unexpanded │                 │ Fetching │            │ Expanded │
//! └────────────┘ ◄────────────── └──────────┘            └──────────┘
//!        ▲          browse failed                              │
//!        └──────────────────── rebrowse() ─────────────────────┘
//! ```
//!
//! The `Unexpanded → Fetching` transition happens under the arena write lock,
//! so concurrent callers issue exactly one browse per node. Completion is
//! published as a [`TreeEvent`]; [`AddressSpace::expand`] waits for it.
//!
//! The first access under a new session generation rebuilds the tree. A
//! disconnect alone keeps what was fetched; only new fetches fail.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::client::session::SessionManager;
use crate::client::transport::{BrowseDescription, ReferenceDescription};
use crate::error::{BrowseError, OpcUaError, OpcUaResult};
use crate::types::{
    BrowseDirection, ExpandedNodeId, LocalizedText, NodeClass, NodeId, QualifiedName,
};

/// Node classes requested by a tree browse.
pub const TREE_NODE_CLASS_MASK: u32 = NodeClass::Object.value()
    | NodeClass::Variable.value()
    | NodeClass::Method.value()
    | NodeClass::DataType.value();

/// Result mask requesting every reference field.
pub const BROWSE_RESULT_MASK_ALL: u32 = 0x3F;

const EVENT_CAPACITY: usize = 256;
const ROOT_KEY: NodeKey = NodeKey(0);

// =============================================================================
// NodeRef
// =============================================================================

/// A browsed reference describing one address-space entry.
///
/// Equality is by node identifier only. Non-local identifiers never compare
/// equal, not even to themselves, so `NodeRef` implements neither `Eq` nor
/// `Hash`.
#[derive(Debug, Clone)]
pub struct NodeRef {
    /// Target node.
    pub node_id: ExpandedNodeId,
    /// Browse name.
    pub browse_name: QualifiedName,
    /// Display name.
    pub display_name: LocalizedText,
    /// Node class.
    pub node_class: NodeClass,
    /// Reference type from the parent.
    pub reference_type_id: NodeId,
    /// Forward reference.
    pub is_forward: bool,
    /// Type definition.
    pub type_definition: ExpandedNodeId,
}

impl NodeRef {
    /// The synthetic reference for the `Root` folder.
    pub fn root() -> Self {
        Self {
            node_id: ExpandedNodeId::local(NodeId::ROOT_FOLDER),
            browse_name: QualifiedName::new(0, "Root"),
            display_name: LocalizedText::new("Root"),
            node_class: NodeClass::Unspecified,
            reference_type_id: NodeId::null(),
            is_forward: true,
            type_definition: ExpandedNodeId::local(NodeId::null()),
        }
    }

    /// Returns the local node id, `None` for remote references.
    pub fn local_id(&self) -> Option<&NodeId> {
        self.node_id.as_local()
    }

    /// Returns `true` if the type definition marks this node as a terminal
    /// Property, BaseDataVariable or DataItem.
    pub fn is_static_leaf(&self) -> bool {
        self.type_definition.as_local().is_some_and(|t| {
            *t == NodeId::PROPERTY_TYPE
                || *t == NodeId::BASE_DATA_VARIABLE_TYPE
                || *t == NodeId::DATA_ITEM_TYPE
        })
    }

    /// Returns `true` if this reference may appear in the navigable tree.
    pub fn is_navigable(&self) -> bool {
        self.node_id.is_local()
            && self.reference_type_id != NodeId::HAS_NOTIFIER
            && self.reference_type_id != NodeId::HAS_EVENT_SOURCE
    }
}

impl From<ReferenceDescription> for NodeRef {
    fn from(r: ReferenceDescription) -> Self {
        Self {
            node_id: r.node_id,
            browse_name: r.browse_name,
            display_name: r.display_name,
            node_class: r.node_class,
            reference_type_id: r.reference_type_id,
            is_forward: r.is_forward,
            type_definition: r.type_definition,
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self.local_id(), other.local_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name.text, self.node_id)
    }
}

/// Keeps navigable references, first occurrence of each local id wins.
pub fn filter_references(references: Vec<ReferenceDescription>) -> Vec<NodeRef> {
    let mut seen = HashSet::new();
    references
        .into_iter()
        .map(NodeRef::from)
        .filter(|r| r.is_navigable())
        .filter(|r| r.local_id().is_some_and(|id| seen.insert(id.clone())))
        .collect()
}

/// Browse request used for every tree fetch.
pub fn tree_browse_description(node_id: NodeId) -> BrowseDescription {
    BrowseDescription {
        node_id,
        direction: BrowseDirection::Forward,
        reference_type_id: NodeId::REFERENCES,
        include_subtypes: true,
        node_class_mask: TREE_NODE_CLASS_MASK,
        result_mask: BROWSE_RESULT_MASK_ALL,
    }
}

// =============================================================================
// Arena types
// =============================================================================

/// Arena key of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fetch state of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FetchState {
    /// No browse issued, or the last one failed.
    #[default]
    Unexpanded,
    /// A browse is in flight.
    Fetching,
    /// Children are populated.
    Expanded,
}

/// Tree change notification.
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// A fetch completed.
    ChildrenUpdated {
        /// Parent node.
        key: NodeKey,
        /// New children in server order.
        children: Vec<(NodeKey, NodeRef)>,
    },
    /// A fetch failed; the node is `Unexpanded` again.
    FetchFailed {
        /// Node whose fetch failed.
        key: NodeKey,
        /// Failure description.
        reason: String,
    },
    /// The whole tree was rebuilt.
    Reset,
}

/// One node of the arena.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// The wrapped reference.
    pub node: NodeRef,
    /// Parent key, `None` for the root.
    pub parent: Option<NodeKey>,
    /// Children in server order.
    pub children: Vec<NodeKey>,
    /// Fetch state.
    pub state: FetchState,
    /// Known to have no browsable children.
    pub leaf: bool,
}

impl TreeEntry {
    fn new(node: NodeRef, parent: Option<NodeKey>) -> Self {
        let leaf = node.is_static_leaf() || node.local_id().is_none();
        Self {
            node,
            parent,
            children: Vec::new(),
            state: FetchState::Unexpanded,
            leaf,
        }
    }
}

#[derive(Debug)]
struct Arena {
    entries: HashMap<NodeKey, TreeEntry>,
    by_node: HashMap<NodeId, Vec<NodeKey>>,
    next_key: u64,
    epoch: u64,
    generation: Option<u64>,
}

impl Arena {
    /// Keys keep counting across rebuilds so stale keys never alias new
    /// nodes; only the root key is stable.
    fn new(epoch: u64, generation: Option<u64>, next_key: u64) -> Self {
        let root = NodeRef::root();
        let mut by_node = HashMap::new();
        by_node.insert(NodeId::ROOT_FOLDER, vec![ROOT_KEY]);
        let mut entries = HashMap::new();
        entries.insert(ROOT_KEY, TreeEntry::new(root, None));
        Self {
            entries,
            by_node,
            next_key: next_key.max(1),
            epoch,
            generation,
        }
    }

    fn insert(&mut self, node: NodeRef, parent: Option<NodeKey>) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        if let Some(id) = node.local_id() {
            self.by_node.entry(id.clone()).or_default().push(key);
        }
        self.entries.insert(key, TreeEntry::new(node, parent));
        key
    }

    fn remove_subtree(&mut self, key: NodeKey) {
        let mut stack = match self.entries.get_mut(&key) {
            Some(entry) => std::mem::take(&mut entry.children),
            None => return,
        };
        while let Some(child) = stack.pop() {
            if let Some(entry) = self.entries.remove(&child) {
                if let Some(id) = entry.node.local_id() {
                    if let Some(keys) = self.by_node.get_mut(id) {
                        keys.retain(|k| *k != child);
                        if keys.is_empty() {
                            self.by_node.remove(id);
                        }
                    }
                }
                stack.extend(entry.children);
            }
        }
    }

    fn children_of(&self, key: NodeKey) -> Vec<(NodeKey, NodeRef)> {
        self.entries
            .get(&key)
            .map(|entry| {
                entry
                    .children
                    .iter()
                    .filter_map(|k| self.entries.get(k).map(|c| (*k, c.node.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

enum Access {
    Ready,
    Pending,
    Start {
        node_id: NodeId,
        epoch: u64,
        runtime: tokio::runtime::Handle,
    },
}

// =============================================================================
// AddressSpace
// =============================================================================

struct Shared {
    sessions: Arc<SessionManager>,
    arena: RwLock<Arena>,
    events: broadcast::Sender<TreeEvent>,
    browses: AtomicU64,
}

/// Address-space tree. Cheap to clone; clones share the arena.
#[derive(Clone)]
pub struct AddressSpace {
    shared: Arc<Shared>,
}

impl AddressSpace {
    /// Creates a tree containing only the root.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let generation = sessions.generation();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                sessions,
                arena: RwLock::new(Arena::new(0, generation, 1)),
                events,
                browses: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the root key.
    pub fn root(&self) -> NodeKey {
        ROOT_KEY
    }

    /// Returns a copy of the entry at `key`.
    pub fn entry(&self, key: NodeKey) -> Option<TreeEntry> {
        self.shared.arena.read().entries.get(&key).cloned()
    }

    /// Returns the reference at `key`.
    pub fn node(&self, key: NodeKey) -> Option<NodeRef> {
        self.shared.arena.read().entries.get(&key).map(|e| e.node.clone())
    }

    /// Returns the fetch state at `key`.
    pub fn state(&self, key: NodeKey) -> Option<FetchState> {
        self.shared.arena.read().entries.get(&key).map(|e| e.state)
    }

    /// Returns `true` if `key` is a leaf.
    pub fn is_leaf(&self, key: NodeKey) -> bool {
        self.shared
            .arena
            .read()
            .entries
            .get(&key)
            .is_some_and(|e| e.leaf)
    }

    /// Returns every key wrapping `node_id`. A node reachable over several
    /// paths appears once per path.
    pub fn find(&self, node_id: &NodeId) -> Vec<NodeKey> {
        self.shared
            .arena
            .read()
            .by_node
            .get(node_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.shared.arena.read().entries.len()
    }

    /// Returns `true` if only the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Returns the number of browse requests issued.
    pub fn browse_count(&self) -> u64 {
        self.shared.browses.load(Ordering::Relaxed)
    }

    /// Subscribes to tree events.
    pub fn events(&self) -> broadcast::Receiver<TreeEvent> {
        self.shared.events.subscribe()
    }

    // =========================================================================
    // Children
    // =========================================================================

    /// Returns the children of `key`.
    ///
    /// Leaves and expanded nodes answer from the arena. Otherwise the first
    /// caller starts a browse and every caller gets an empty list; the
    /// children arrive as [`TreeEvent::ChildrenUpdated`].
    ///
    /// The browse is spawned on the calling Tokio runtime.
    ///
    /// # Errors
    ///
    /// - `BrowseError::NodeNotFound` for an unknown key.
    /// - `ConnectionError::NotConnected` when a fetch is needed without a
    ///   session.
    /// - `BrowseError::BrowseFailed` when a fetch is needed and the caller is
    ///   outside a Tokio runtime. The node stays `Unexpanded`.
    pub fn get_children(&self, key: NodeKey) -> OpcUaResult<Vec<(NodeKey, NodeRef)>> {
        Ok(self.access(key)?.unwrap_or_default())
    }

    /// Returns the children of `key`, waiting for a fetch if one is needed.
    ///
    /// # Errors
    ///
    /// As [`get_children`](Self::get_children), plus the browse failure when
    /// the fetch fails.
    pub async fn expand(&self, key: NodeKey) -> OpcUaResult<Vec<(NodeKey, NodeRef)>> {
        let mut events = self.events();
        if let Some(children) = self.access(key)? {
            return Ok(children);
        }

        loop {
            let settled = match events.recv().await {
                Ok(TreeEvent::ChildrenUpdated { key: k, children }) if k == key => {
                    return Ok(children);
                }
                Ok(TreeEvent::FetchFailed { key: k, reason }) if k == key => {
                    return Err(OpcUaError::browse_failed(key.to_string(), reason));
                }
                Ok(TreeEvent::Reset) => self.settled(key),
                Ok(_) => None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Tree event receiver lagged");
                    self.settled(key)
                }
                Err(broadcast::error::RecvError::Closed) => {
                    Some(Err(OpcUaError::browse_failed(key.to_string(), "tree dropped")))
                }
            };
            if let Some(outcome) = settled {
                return outcome;
            }
        }
    }

    /// `Some(children)` when answerable now, `None` while a fetch runs.
    fn access(&self, key: NodeKey) -> OpcUaResult<Option<Vec<(NodeKey, NodeRef)>>> {
        let access = {
            let mut arena = self.shared.arena.write();
            let current = self.shared.sessions.generation();
            if current.is_some() && arena.generation != current {
                self.reset_locked(&mut arena);
            }
            let epoch = arena.epoch;
            let entry = arena
                .entries
                .get_mut(&key)
                .ok_or_else(|| OpcUaError::browse(BrowseError::node_not_found(key.to_string())))?;

            if entry.leaf || entry.state == FetchState::Expanded {
                Access::Ready
            } else if entry.state == FetchState::Fetching {
                Access::Pending
            } else {
                let node_id = entry.node.local_id().cloned().ok_or_else(|| {
                    OpcUaError::browse_failed(entry.node.node_id.to_string(), "not a local node")
                })?;
                self.shared.sessions.current()?;
                let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                    OpcUaError::browse_failed(node_id.to_string(), "no async runtime")
                })?;
                entry.state = FetchState::Fetching;
                Access::Start {
                    node_id,
                    epoch,
                    runtime,
                }
            }
        };

        match access {
            Access::Ready => Ok(Some(self.shared.arena.read().children_of(key))),
            Access::Pending => Ok(None),
            Access::Start {
                node_id,
                epoch,
                runtime,
            } => {
                let tree = self.clone();
                runtime.spawn(async move {
                    let outcome = tree.browse(&node_id).await;
                    tree.complete(key, epoch, &node_id, outcome);
                });
                Ok(None)
            }
        }
    }

    /// Outcome for a waiter that may have missed its event.
    fn settled(&self, key: NodeKey) -> Option<OpcUaResult<Vec<(NodeKey, NodeRef)>>> {
        let arena = self.shared.arena.read();
        let Some(entry) = arena.entries.get(&key) else {
            return Some(Err(OpcUaError::browse(BrowseError::node_not_found(key.to_string()))));
        };
        match entry.state {
            FetchState::Fetching => None,
            _ if entry.leaf || entry.state == FetchState::Expanded => {
                Some(Ok(arena.children_of(key)))
            }
            _ => Some(Err(OpcUaError::browse_failed(
                key.to_string(),
                "fetch did not complete",
            ))),
        }
    }

    async fn browse(&self, node_id: &NodeId) -> OpcUaResult<Vec<NodeRef>> {
        let active = self.shared.sessions.current()?;
        let timeout = self.shared.sessions.config().request_timeout;
        self.shared.browses.fetch_add(1, Ordering::Relaxed);
        debug!(node_id = %node_id, "Browsing");

        let description = tree_browse_description(node_id.clone());
        let results = tokio::time::timeout(timeout, active.session().browse(&[description]))
            .await
            .map_err(|_| OpcUaError::request_timeout(timeout))??;

        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| OpcUaError::browse_failed(node_id.to_string(), "empty browse result"))?;
        if result.status.is_bad() {
            return Err(OpcUaError::browse_failed(node_id.to_string(), result.status.to_string()));
        }
        Ok(filter_references(result.references))
    }

    fn complete(
        &self,
        key: NodeKey,
        epoch: u64,
        node_id: &NodeId,
        outcome: OpcUaResult<Vec<NodeRef>>,
    ) {
        let event = {
            let mut arena = self.shared.arena.write();
            if arena.epoch != epoch {
                debug!(node_id = %node_id, "Discarding browse result for a previous tree");
                return;
            }
            let Some(entry) = arena.entries.get_mut(&key) else {
                return;
            };

            let children = match outcome {
                Ok(children) => children,
                Err(e) => {
                    entry.state = FetchState::Unexpanded;
                    e.log("tree fetch");
                    drop(arena);
                    let _ = self.shared.events.send(TreeEvent::FetchFailed {
                        key,
                        reason: e.to_string(),
                    });
                    return;
                }
            };

            if !entry.children.is_empty() {
                entry.state = FetchState::Expanded;
                OpcUaError::browse(BrowseError::double_update(node_id.to_string()))
                    .log("tree fetch");
                return;
            }
            entry.state = FetchState::Expanded;
            entry.leaf = children.is_empty();

            let keys: Vec<NodeKey> = children
                .iter()
                .map(|child| arena.insert(child.clone(), Some(key)))
                .collect();
            if let Some(entry) = arena.entries.get_mut(&key) {
                entry.children = keys.clone();
            }
            debug!(node_id = %node_id, children = keys.len(), "Children populated");
            TreeEvent::ChildrenUpdated {
                key,
                children: keys.into_iter().zip(children).collect(),
            }
        };
        let _ = self.shared.events.send(event);
    }

    // =========================================================================
    // Rebuild
    // =========================================================================

    /// Drops the subtree under `key` and marks it `Unexpanded`.
    ///
    /// Returns `false` while a fetch is in flight or for an unknown key.
    pub fn rebrowse(&self, key: NodeKey) -> bool {
        let mut arena = self.shared.arena.write();
        match arena.entries.get(&key).map(|e| e.state) {
            None | Some(FetchState::Fetching) => return false,
            Some(_) => {}
        }
        arena.remove_subtree(key);
        if let Some(entry) = arena.entries.get_mut(&key) {
            entry.state = FetchState::Unexpanded;
            entry.leaf = entry.node.is_static_leaf();
            info!(node_id = %entry.node.node_id, "Subtree reset for re-browse");
        }
        true
    }

    /// Discards the whole tree. In-flight fetches are ignored when they
    /// complete.
    pub fn reset(&self) {
        let mut arena = self.shared.arena.write();
        self.reset_locked(&mut arena);
    }

    fn reset_locked(&self, arena: &mut Arena) {
        let nodes = arena.entries.len();
        *arena = Arena::new(arena.epoch + 1, self.shared.sessions.generation(), arena.next_key);
        if nodes > 1 {
            warn!(nodes, "Address space tree rebuilt");
        }
        let _ = self.shared.events.send(TreeEvent::Reset);
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("nodes", &self.len())
            .field("browses", &self.browse_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::testing::{reference, reference_with_type, FakeTransport};
    use crate::types::{ClientConfig, Identity, StatusCode};

    const URL: &str = "opc.tcp://host:4840";

    async fn connected() -> (Arc<FakeTransport>, Arc<SessionManager>, AddressSpace) {
        let transport = FakeTransport::single(URL);
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&transport) as Arc<dyn crate::client::OpcUaTransport>,
            ClientConfig::default(),
        ));
        sessions.connect(URL, None, Identity::Anonymous).await.unwrap();
        let tree = AddressSpace::new(Arc::clone(&sessions));
        (transport, sessions, tree)
    }

    #[test]
    fn test_node_ref_equality() {
        let a = NodeRef::from(reference(NodeId::numeric(2, 1), "A", NodeClass::Object));
        let mut b = NodeRef::from(reference(NodeId::numeric(2, 1), "Other", NodeClass::Variable));
        assert_eq!(a, b);

        b.node_id.server_index = 3;
        assert_ne!(a, b);
        assert_ne!(b, b.clone());
    }

    #[test]
    fn test_filter_references() {
        let mut notifier = reference(NodeId::numeric(2, 5), "Events", NodeClass::Object);
        notifier.reference_type_id = NodeId::HAS_NOTIFIER;
        let mut remote = reference(NodeId::numeric(2, 6), "Remote", NodeClass::Object);
        remote.node_id.namespace_uri = Some("urn:other".into());

        let kept = filter_references(vec![
            reference(NodeId::numeric(2, 1), "A", NodeClass::Object),
            notifier,
            remote,
            reference(NodeId::numeric(2, 1), "A again", NodeClass::Object),
            reference(NodeId::numeric(2, 2), "B", NodeClass::Variable),
        ]);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].display_name.text, "A");
        assert_eq!(kept[1].display_name.text, "B");
    }

    #[test]
    fn test_static_leaf_types() {
        for type_def in [
            NodeId::PROPERTY_TYPE,
            NodeId::BASE_DATA_VARIABLE_TYPE,
            NodeId::DATA_ITEM_TYPE,
        ] {
            let node = NodeRef::from(reference_with_type(
                NodeId::numeric(2, 1),
                "V",
                NodeClass::Variable,
                type_def,
            ));
            assert!(node.is_static_leaf());
        }
        assert!(!NodeRef::root().is_static_leaf());
    }

    #[test]
    fn test_browse_description() {
        let d = tree_browse_description(NodeId::OBJECTS_FOLDER);
        assert_eq!(d.direction, BrowseDirection::Forward);
        assert_eq!(d.reference_type_id, NodeId::REFERENCES);
        assert!(d.include_subtypes);
        assert_eq!(d.node_class_mask, 1 | 2 | 4 | 64);
        assert_eq!(d.result_mask, 63);
    }

    #[tokio::test]
    async fn test_get_children_requires_session() {
        let transport = FakeTransport::single(URL);
        let sessions = Arc::new(SessionManager::new(transport, ClientConfig::default()));
        let tree = AddressSpace::new(sessions);

        let err = tree.get_children(tree.root()).unwrap_err();
        assert!(err.is_not_connected());
        assert_eq!(tree.state(tree.root()), Some(FetchState::Unexpanded));
    }

    #[tokio::test]
    async fn test_expand_root() {
        let (transport, _sessions, tree) = connected().await;
        transport.session().set_children(
            NodeId::ROOT_FOLDER,
            vec![
                reference(NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object),
                reference(NodeId::TYPES_FOLDER, "Types", NodeClass::Object),
            ],
        );

        let children = tree.expand(tree.root()).await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(tree.state(tree.root()), Some(FetchState::Expanded));
        assert!(!tree.is_leaf(tree.root()));

        let again = tree.get_children(tree.root()).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(transport.session().browse_calls(), 1);
        assert_eq!(tree.find(&NodeId::OBJECTS_FOLDER).len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_access_browses_once() {
        let (transport, _sessions, tree) = connected().await;
        transport.session().set_browse_delay(Duration::from_millis(50));
        transport.session().set_children(
            NodeId::ROOT_FOLDER,
            vec![reference(NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object)],
        );

        let root = tree.root();
        let (a, b, c) = tokio::join!(tree.expand(root), tree.expand(root), tree.expand(root));
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(transport.session().browse_calls(), 1);
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[tokio::test]
    async fn test_empty_result_marks_leaf() {
        let (_transport, _sessions, tree) = connected().await;
        let children = tree.expand(tree.root()).await.unwrap();
        assert!(children.is_empty());
        assert!(tree.is_leaf(tree.root()));
    }

    #[tokio::test]
    async fn test_failed_fetch_resets_for_retry() {
        let (transport, _sessions, tree) = connected().await;
        transport.session().fail_next_browses(1);
        transport.session().set_children(
            NodeId::ROOT_FOLDER,
            vec![reference(NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object)],
        );

        assert!(tree.expand(tree.root()).await.is_err());
        assert_eq!(tree.state(tree.root()), Some(FetchState::Unexpanded));

        let children = tree.expand(tree.root()).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(transport.session().browse_calls(), 2);
    }

    #[tokio::test]
    async fn test_bad_status_is_failure() {
        let (transport, _sessions, tree) = connected().await;
        transport
            .session()
            .set_browse_status(NodeId::ROOT_FOLDER, StatusCode::BAD_NODE_ID_UNKNOWN);

        let err = tree.expand(tree.root()).await.unwrap_err();
        assert_eq!(err.category(), "browse");
        assert_eq!(tree.state(tree.root()), Some(FetchState::Unexpanded));
    }

    #[tokio::test]
    async fn test_static_leaf_never_browses() {
        let (transport, _sessions, tree) = connected().await;
        transport.session().set_children(
            NodeId::ROOT_FOLDER,
            vec![reference_with_type(
                NodeId::numeric(2, 7),
                "Speed",
                NodeClass::Variable,
                NodeId::BASE_DATA_VARIABLE_TYPE,
            )],
        );

        let children = tree.expand(tree.root()).await.unwrap();
        let leaf = children[0].0;
        assert!(tree.is_leaf(leaf));
        assert!(tree.expand(leaf).await.unwrap().is_empty());
        assert_eq!(transport.session().browse_calls(), 1);
    }

    #[tokio::test]
    async fn test_rebrowse_drops_subtree() {
        let (transport, _sessions, tree) = connected().await;
        transport.session().set_children(
            NodeId::ROOT_FOLDER,
            vec![reference(NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object)],
        );
        tree.expand(tree.root()).await.unwrap();
        assert_eq!(tree.len(), 2);

        assert!(tree.rebrowse(tree.root()));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.state(tree.root()), Some(FetchState::Unexpanded));
        assert!(tree.find(&NodeId::OBJECTS_FOLDER).is_empty());

        tree.expand(tree.root()).await.unwrap();
        assert_eq!(transport.session().browse_calls(), 2);
    }

    #[tokio::test]
    async fn test_rebrowse_while_fetching_is_refused() {
        let (transport, _sessions, tree) = connected().await;
        transport.session().set_browse_delay(Duration::from_millis(50));

        tree.get_children(tree.root()).unwrap();
        assert!(!tree.rebrowse(tree.root()));
    }

    #[tokio::test]
    async fn test_reconnect_rebuilds_tree() {
        let (transport, sessions, tree) = connected().await;
        transport.session().set_children(
            NodeId::ROOT_FOLDER,
            vec![reference(NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object)],
        );
        tree.expand(tree.root()).await.unwrap();

        sessions.connect(URL, None, Identity::Anonymous).await.unwrap();
        assert_eq!(tree.get_children(tree.root()).unwrap(), Vec::new());
        assert_eq!(tree.state(tree.root()), Some(FetchState::Fetching));
    }

    #[tokio::test]
    async fn test_disconnect_keeps_expanded_nodes() {
        let (transport, sessions, tree) = connected().await;
        transport.session().set_children(
            NodeId::ROOT_FOLDER,
            vec![reference(NodeId::OBJECTS_FOLDER, "Objects", NodeClass::Object)],
        );
        tree.expand(tree.root()).await.unwrap();

        sessions.disconnect().await.unwrap();
        let children = tree.get_children(tree.root()).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(tree.state(tree.root()), Some(FetchState::Expanded));

        let objects = children[0].0;
        assert!(tree.get_children(objects).unwrap_err().is_not_connected());
        assert_eq!(transport.session().browse_calls(), 1);
    }

    #[test]
    fn test_fetch_outside_runtime_fails() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (_transport, _sessions, tree) = runtime.block_on(connected());

        let err = tree.get_children(tree.root()).unwrap_err();
        assert_eq!(err.category(), "browse");
        assert_eq!(tree.state(tree.root()), Some(FetchState::Unexpanded));

        let children = runtime.block_on(tree.expand(tree.root())).unwrap();
        assert!(children.is_empty());
    }
}
