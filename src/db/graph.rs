//! The store itself plus element-level operations on a transaction.
//!
//! Creation and deletion of elements touch more than one lock. The order is
//! fixed store-wide: vertices before edges, and between two vertices the
//! lower gid first, with a single acquisition for self-loops. All conflict
//! checks run before the first mutation so a rejected operation leaves no
//! partial state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, trace};

use crate::db::config::Config;
use crate::db::edge_accessor::EdgeAccessor;
use crate::db::oracle::TimestampOracle;
use crate::db::transaction::{ElementHandle, Transaction};
use crate::db::vertex_accessor::VertexAccessor;
use crate::error::{GraphError, Result};
use crate::storage::delta::{DeltaAction, EdgeEndpoints};
use crate::storage::edge::Edge;
use crate::storage::mvcc::{
    create_and_link_delta, prepare_for_write, stamp_write, ElementInfo, View,
};
use crate::storage::types::{AdjacencyEntry, EdgeTypeId, Gid};
use crate::storage::vertex::Vertex;

/// In-memory transactional graph store.
///
/// Thread-safe: any number of transactions may run concurrently, each from
/// its own thread. All state lives in process memory; persistence and
/// replication consume the commit receipt externally.
pub struct GraphStore {
    config: Config,
    oracle: TimestampOracle,
    vertices: DashMap<Gid, Arc<Vertex>>,
    edges: DashMap<Gid, Arc<Edge>>,
    next_gid: AtomicU64,
    /// Serializes snapshot allocation against commit publication. A commit
    /// holds this from its start-time allocation through the slot publish;
    /// a snapshot allocated under the same lock therefore never lands
    /// inside that window and sees the commit either fully or not at all.
    commit_lock: Mutex<()>,
}

impl GraphStore {
    /// Opens an empty store with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        info!(?config, "graph store opened");
        Ok(Self {
            config,
            oracle: TimestampOracle::new(),
            vertices: DashMap::new(),
            edges: DashMap::new(),
            next_gid: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
        })
    }

    /// The store's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of vertices, live and tombstoned alike.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges, live and tombstoned alike.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Opens a transaction whose snapshot is the state committed so far.
    pub fn begin_transaction(&self) -> Transaction<'_> {
        let id = self.oracle.allocate_transaction_id();
        let snapshot_ts = {
            let _commit = self.commit_lock.lock();
            self.oracle.allocate_start_timestamp()
        };
        Transaction::new(self, id, snapshot_ts)
    }

    pub(crate) fn oracle(&self) -> &TimestampOracle {
        &self.oracle
    }

    pub(crate) fn commit_lock(&self) -> &Mutex<()> {
        &self.commit_lock
    }

    pub(crate) fn vertex_by_gid(&self, gid: Gid) -> Option<Arc<Vertex>> {
        self.vertices.get(&gid).map(|entry| entry.value().clone())
    }

    pub(crate) fn edge_by_gid(&self, gid: Gid) -> Option<Arc<Edge>> {
        self.edges.get(&gid).map(|entry| entry.value().clone())
    }

    pub(crate) fn drop_vertex(&self, gid: Gid) {
        self.vertices.remove(&gid);
    }

    pub(crate) fn drop_edge(&self, gid: Gid) {
        self.edges.remove(&gid);
    }

    /// Gids come from a single counter, so they are unique across the
    /// vertex and edge tables.
    fn allocate_gid(&self) -> Gid {
        Gid(self.next_gid.fetch_add(1, Ordering::AcqRel))
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        // Config::default always validates.
        match Self::new(Config::default()) {
            Ok(store) => store,
            Err(_) => unreachable!(),
        }
    }
}

impl<'db> Transaction<'db> {
    /// Creates a vertex visible only to this transaction until commit.
    pub fn create_vertex(&self) -> Result<VertexAccessor<'_, 'db>> {
        let store = self.store();
        let gid = store.allocate_gid();
        let vertex = Arc::new(Vertex::new(gid));
        {
            let mut inner = vertex.inner.lock();
            create_and_link_delta(
                self,
                ElementHandle::Vertex(vertex.clone()),
                &mut inner.delta,
                DeltaAction::DeleteObject,
                None,
                0,
            )?;
        }
        store.vertices.insert(gid, vertex.clone());
        self.advance_command();
        trace!(tx_id = self.id(), gid = gid.as_u64(), "vertex created");
        Ok(VertexAccessor::new(vertex, self, false))
    }

    /// Looks up a vertex, returning it only if visible under `view`.
    pub fn vertex(&self, gid: Gid, view: View) -> Option<VertexAccessor<'_, 'db>> {
        let vertex = self.store().vertex_by_gid(gid)?;
        let accessor = VertexAccessor::new(vertex, self, false);
        accessor.is_visible(view).then_some(accessor)
    }

    /// Looks up a vertex with the tombstone pass-through enabled: property
    /// and label reads work on a deleted vertex, writes and traversal still
    /// fail.
    pub fn vertex_for_deleted(&self, gid: Gid, view: View) -> Option<VertexAccessor<'_, 'db>> {
        let vertex = self.store().vertex_by_gid(gid)?;
        let accessor = VertexAccessor::new(vertex, self, true);
        accessor.is_visible(view).then_some(accessor)
    }

    /// Looks up an edge, returning it only if visible under `view`.
    pub fn edge(&self, gid: Gid, view: View) -> Option<EdgeAccessor<'_, 'db>> {
        let edge = self.store().edge_by_gid(gid)?;
        let accessor = EdgeAccessor::new(edge, self, false);
        accessor.is_visible(view).then_some(accessor)
    }

    /// Edge lookup with the tombstone pass-through enabled.
    pub fn edge_for_deleted(&self, gid: Gid, view: View) -> Option<EdgeAccessor<'_, 'db>> {
        let edge = self.store().edge_by_gid(gid)?;
        let accessor = EdgeAccessor::new(edge, self, true);
        accessor.is_visible(view).then_some(accessor)
    }

    /// Creates an edge between two vertices.
    ///
    /// Both endpoints are written (their adjacency lists change), so either
    /// being held by another open transaction or tombstoned fails the whole
    /// operation before anything mutates.
    pub fn create_edge(
        &self,
        from: &VertexAccessor<'_, 'db>,
        to: &VertexAccessor<'_, 'db>,
        edge_type: EdgeTypeId,
    ) -> Result<EdgeAccessor<'_, 'db>> {
        let store = self.store();
        let config = store.config();
        let from_vertex = from.vertex().clone();
        let to_vertex = to.vertex().clone();
        let gid = store.allocate_gid();

        let out_entry = AdjacencyEntry {
            edge_type,
            vertex: to_vertex.gid,
            edge: gid,
        };
        let in_entry = AdjacencyEntry {
            edge_type,
            vertex: from_vertex.gid,
            edge: gid,
        };

        if from_vertex.gid == to_vertex.gid {
            let mut guard = from_vertex.inner.lock();
            let inner = &mut *guard;
            prepare_for_write(self, inner.delta.as_ref(), inner.deleted)?;
            let info = ElementInfo::Vertex {
                gid: from_vertex.gid,
            };
            let ts = stamp_write(
                self,
                config,
                &info,
                inner.delta.as_ref(),
                inner.transaction_st,
                &mut inner.churn,
                &inner.properties,
            )?;
            create_and_link_delta(
                self,
                ElementHandle::Vertex(from_vertex.clone()),
                &mut inner.delta,
                DeltaAction::RemoveOutEdge(out_entry),
                None,
                ts,
            )?;
            inner.out_edges.push(out_entry);
            create_and_link_delta(
                self,
                ElementHandle::Vertex(from_vertex.clone()),
                &mut inner.delta,
                DeltaAction::RemoveInEdge(in_entry),
                None,
                ts,
            )?;
            inner.in_edges.push(in_entry);
        } else {
            let (mut from_guard, mut to_guard);
            if from_vertex.gid < to_vertex.gid {
                from_guard = from_vertex.inner.lock();
                to_guard = to_vertex.inner.lock();
            } else {
                to_guard = to_vertex.inner.lock();
                from_guard = from_vertex.inner.lock();
            }
            let from_inner = &mut *from_guard;
            let to_inner = &mut *to_guard;

            prepare_for_write(self, from_inner.delta.as_ref(), from_inner.deleted)?;
            prepare_for_write(self, to_inner.delta.as_ref(), to_inner.deleted)?;

            let from_info = ElementInfo::Vertex {
                gid: from_vertex.gid,
            };
            let from_ts = stamp_write(
                self,
                config,
                &from_info,
                from_inner.delta.as_ref(),
                from_inner.transaction_st,
                &mut from_inner.churn,
                &from_inner.properties,
            )?;
            create_and_link_delta(
                self,
                ElementHandle::Vertex(from_vertex.clone()),
                &mut from_inner.delta,
                DeltaAction::RemoveOutEdge(out_entry),
                None,
                from_ts,
            )?;
            from_inner.out_edges.push(out_entry);

            let to_info = ElementInfo::Vertex { gid: to_vertex.gid };
            let to_ts = stamp_write(
                self,
                config,
                &to_info,
                to_inner.delta.as_ref(),
                to_inner.transaction_st,
                &mut to_inner.churn,
                &to_inner.properties,
            )?;
            create_and_link_delta(
                self,
                ElementHandle::Vertex(to_vertex.clone()),
                &mut to_inner.delta,
                DeltaAction::RemoveInEdge(in_entry),
                None,
                to_ts,
            )?;
            to_inner.in_edges.push(in_entry);
        }

        let edge = Arc::new(Edge::new(gid, from_vertex.gid, to_vertex.gid, edge_type));
        let endpoints = EdgeEndpoints {
            from: from_vertex.gid,
            to: to_vertex.gid,
            edge_type,
        };
        {
            let mut inner = edge.inner.lock();
            create_and_link_delta(
                self,
                ElementHandle::Edge(edge.clone()),
                &mut inner.delta,
                DeltaAction::DeleteObject,
                Some(endpoints),
                0,
            )?;
        }
        store.edges.insert(gid, edge.clone());
        self.advance_command();
        trace!(
            tx_id = self.id(),
            gid = gid.as_u64(),
            from = from_vertex.gid.as_u64(),
            to = to_vertex.gid.as_u64(),
            "edge created"
        );
        Ok(EdgeAccessor::new(edge, self, false))
    }

    /// Tombstones a vertex.
    ///
    /// The vertex must have no remaining edges; detach them first with
    /// [`Transaction::delete_edge`].
    pub fn delete_vertex(&self, vertex: &VertexAccessor<'_, 'db>) -> Result<()> {
        let config = self.store().config();
        let vertex = vertex.vertex().clone();
        let mut guard = vertex.inner.lock();
        let inner = &mut *guard;
        prepare_for_write(self, inner.delta.as_ref(), inner.deleted)?;
        if !inner.in_edges.is_empty() || !inner.out_edges.is_empty() {
            return Err(GraphError::InvalidArgument(
                "cannot delete a vertex that still has edges".into(),
            ));
        }
        let info = ElementInfo::Vertex { gid: vertex.gid };
        let ts = stamp_write(
            self,
            config,
            &info,
            inner.delta.as_ref(),
            inner.transaction_st,
            &mut inner.churn,
            &inner.properties,
        )?;
        create_and_link_delta(
            self,
            ElementHandle::Vertex(vertex.clone()),
            &mut inner.delta,
            DeltaAction::RecreateObject,
            None,
            ts,
        )?;
        inner.deleted = true;
        self.advance_command();
        trace!(tx_id = self.id(), gid = vertex.gid.as_u64(), "vertex deleted");
        Ok(())
    }

    /// Tombstones an edge and unlinks it from both endpoint adjacency
    /// lists.
    pub fn delete_edge(&self, edge: &EdgeAccessor<'_, 'db>) -> Result<()> {
        let store = self.store();
        let config = store.config();
        let edge = edge.edge().clone();
        let from_vertex = store
            .vertex_by_gid(edge.from)
            .ok_or(GraphError::NonexistentObject)?;
        let to_vertex = store
            .vertex_by_gid(edge.to)
            .ok_or(GraphError::NonexistentObject)?;

        let endpoints = EdgeEndpoints {
            from: edge.from,
            to: edge.to,
            edge_type: edge.edge_type,
        };
        let out_entry = AdjacencyEntry {
            edge_type: edge.edge_type,
            vertex: edge.to,
            edge: edge.gid,
        };
        let in_entry = AdjacencyEntry {
            edge_type: edge.edge_type,
            vertex: edge.from,
            edge: edge.gid,
        };

        let self_loop = from_vertex.gid == to_vertex.gid;
        let (mut from_guard, mut to_guard);
        let (from_inner, to_inner): (&mut _, Option<&mut _>) = if self_loop {
            from_guard = from_vertex.inner.lock();
            (&mut *from_guard, None)
        } else if from_vertex.gid < to_vertex.gid {
            from_guard = from_vertex.inner.lock();
            to_guard = to_vertex.inner.lock();
            (&mut *from_guard, Some(&mut *to_guard))
        } else {
            to_guard = to_vertex.inner.lock();
            from_guard = from_vertex.inner.lock();
            (&mut *from_guard, Some(&mut *to_guard))
        };
        let mut edge_guard = edge.inner.lock();
        let edge_inner = &mut *edge_guard;

        prepare_for_write(self, edge_inner.delta.as_ref(), edge_inner.deleted)?;
        prepare_for_write(self, from_inner.delta.as_ref(), from_inner.deleted)?;
        if let Some(to_inner) = &to_inner {
            prepare_for_write(self, to_inner.delta.as_ref(), to_inner.deleted)?;
        }

        let edge_info = ElementInfo::Edge {
            gid: edge.gid,
            endpoints,
        };
        let edge_ts = stamp_write(
            self,
            config,
            &edge_info,
            edge_inner.delta.as_ref(),
            edge_inner.transaction_st,
            &mut edge_inner.churn,
            &edge_inner.properties,
        )?;
        create_and_link_delta(
            self,
            ElementHandle::Edge(edge.clone()),
            &mut edge_inner.delta,
            DeltaAction::RecreateObject,
            Some(endpoints),
            edge_ts,
        )?;
        edge_inner.deleted = true;

        let from_info = ElementInfo::Vertex {
            gid: from_vertex.gid,
        };
        let from_ts = stamp_write(
            self,
            config,
            &from_info,
            from_inner.delta.as_ref(),
            from_inner.transaction_st,
            &mut from_inner.churn,
            &from_inner.properties,
        )?;
        create_and_link_delta(
            self,
            ElementHandle::Vertex(from_vertex.clone()),
            &mut from_inner.delta,
            DeltaAction::AddOutEdge(out_entry),
            None,
            from_ts,
        )?;
        from_inner.out_edges.retain(|e| e != &out_entry);

        // For a self-loop both adjacency lists live on the same inner.
        let in_side = match to_inner {
            Some(inner) => inner,
            None => from_inner,
        };
        if !self_loop {
            let to_info = ElementInfo::Vertex { gid: to_vertex.gid };
            let to_ts = stamp_write(
                self,
                config,
                &to_info,
                in_side.delta.as_ref(),
                in_side.transaction_st,
                &mut in_side.churn,
                &in_side.properties,
            )?;
            create_and_link_delta(
                self,
                ElementHandle::Vertex(to_vertex.clone()),
                &mut in_side.delta,
                DeltaAction::AddInEdge(in_entry),
                None,
                to_ts,
            )?;
        } else {
            create_and_link_delta(
                self,
                ElementHandle::Vertex(from_vertex.clone()),
                &mut in_side.delta,
                DeltaAction::AddInEdge(in_entry),
                None,
                from_ts,
            )?;
        }
        in_side.in_edges.retain(|e| e != &in_entry);

        self.advance_command();
        trace!(tx_id = self.id(), gid = edge.gid.as_u64(), "edge deleted");
        Ok(())
    }
}
