//! Read and write surface of a single vertex within one transaction.
//!
//! Every read snapshots the fields it needs plus the chain head under the
//! element lock, drops the lock, then replays the chain to the
//! transaction's snapshot. Every write holds the lock across the admission
//! checks, the chain append, and the in-place mutation.

use std::mem;
use std::sync::Arc;

use crate::db::transaction::{ElementHandle, Transaction};
use crate::error::{GraphError, Result};
use crate::storage::delta::DeltaAction;
use crate::storage::mvcc::{
    apply_deltas_for_read, create_and_link_delta, prepare_for_write, stamp_write, ElementInfo,
    View,
};
use crate::storage::property_value::{PropertyMap, PropertyValue};
use crate::storage::types::{AdjacencyEntry, Gid, LabelId, PropertyId};
use crate::storage::vertex::Vertex;

use crate::db::edge_accessor::EdgeAccessor;

enum Direction {
    In,
    Out,
}

/// Handle to one vertex, scoped to the transaction that produced it.
///
/// With the tombstone pass-through enabled (see
/// [`Transaction::vertex_for_deleted`]) property and label reads succeed on
/// a deleted vertex; writes and adjacency traversal (edges and degrees)
/// still fail with [`GraphError::DeletedObject`].
pub struct VertexAccessor<'a, 'db> {
    vertex: Arc<Vertex>,
    txn: &'a Transaction<'db>,
    for_deleted: bool,
}

impl<'a, 'db> VertexAccessor<'a, 'db> {
    pub(crate) fn new(vertex: Arc<Vertex>, txn: &'a Transaction<'db>, for_deleted: bool) -> Self {
        Self {
            vertex,
            txn,
            for_deleted,
        }
    }

    pub(crate) fn vertex(&self) -> &Arc<Vertex> {
        &self.vertex
    }

    /// The vertex's identity.
    pub fn gid(&self) -> Gid {
        self.vertex.gid
    }

    /// Whether this vertex exists and is not deleted as of `view`.
    ///
    /// With the tombstone pass-through the deletion flag is ignored; an
    /// element that did not exist at the snapshot stays invisible either
    /// way.
    pub fn is_visible(&self, view: View) -> bool {
        let (mut deleted, head) = {
            let inner = self.vertex.inner.lock();
            (inner.deleted, inner.delta.clone())
        };
        let mut exists = true;
        apply_deltas_for_read(self.txn, head, view, |entry| match entry.action {
            DeltaAction::RecreateObject => deleted = false,
            DeltaAction::DeleteObject => exists = false,
            _ => {}
        });
        exists && (self.for_deleted || !deleted)
    }

    /// Whether `label` is set as of `view`.
    pub fn has_label(&self, label: LabelId, view: View) -> Result<bool> {
        let (mut deleted, mut has, head) = {
            let inner = self.vertex.inner.lock();
            (inner.deleted, inner.labels.contains(&label), inner.delta.clone())
        };
        let mut exists = true;
        apply_deltas_for_read(self.txn, head, view, |entry| match entry.action {
            DeltaAction::AddLabel(l) if l == label => has = true,
            DeltaAction::RemoveLabel(l) if l == label => has = false,
            DeltaAction::RecreateObject => deleted = false,
            DeltaAction::DeleteObject => exists = false,
            _ => {}
        });
        if !exists {
            return Err(GraphError::NonexistentObject);
        }
        if deleted && !self.for_deleted {
            return Err(GraphError::DeletedObject);
        }
        Ok(has)
    }

    /// All labels as of `view`.
    pub fn labels(&self, view: View) -> Result<Vec<LabelId>> {
        let (mut deleted, mut labels, head) = {
            let inner = self.vertex.inner.lock();
            (inner.deleted, inner.labels.clone(), inner.delta.clone())
        };
        let mut exists = true;
        apply_deltas_for_read(self.txn, head, view, |entry| match entry.action {
            DeltaAction::AddLabel(l) => {
                if !labels.contains(&l) {
                    labels.push(l);
                }
            }
            DeltaAction::RemoveLabel(l) => labels.retain(|x| *x != l),
            DeltaAction::RecreateObject => deleted = false,
            DeltaAction::DeleteObject => exists = false,
            _ => {}
        });
        if !exists {
            return Err(GraphError::NonexistentObject);
        }
        if deleted && !self.for_deleted {
            return Err(GraphError::DeletedObject);
        }
        Ok(labels)
    }

    /// Sets `label`. Returns `false` without logging anything when the
    /// label is already present.
    pub fn add_label(&self, label: LabelId) -> Result<bool> {
        let mut guard = self.vertex.inner.lock();
        let inner = &mut *guard;
        prepare_for_write(self.txn, inner.delta.as_ref(), inner.deleted)?;
        if inner.labels.contains(&label) {
            return Ok(false);
        }
        let info = ElementInfo::Vertex {
            gid: self.vertex.gid,
        };
        let ts = stamp_write(
            self.txn,
            self.txn.store().config(),
            &info,
            inner.delta.as_ref(),
            inner.transaction_st,
            &mut inner.churn,
            &inner.properties,
        )?;
        create_and_link_delta(
            self.txn,
            ElementHandle::Vertex(self.vertex.clone()),
            &mut inner.delta,
            DeltaAction::RemoveLabel(label),
            None,
            ts,
        )?;
        inner.labels.push(label);
        self.txn.advance_command();
        Ok(true)
    }

    /// Clears `label`. Returns `false` without logging anything when the
    /// label is absent.
    pub fn remove_label(&self, label: LabelId) -> Result<bool> {
        let mut guard = self.vertex.inner.lock();
        let inner = &mut *guard;
        prepare_for_write(self.txn, inner.delta.as_ref(), inner.deleted)?;
        if !inner.labels.contains(&label) {
            return Ok(false);
        }
        let info = ElementInfo::Vertex {
            gid: self.vertex.gid,
        };
        let ts = stamp_write(
            self.txn,
            self.txn.store().config(),
            &info,
            inner.delta.as_ref(),
            inner.transaction_st,
            &mut inner.churn,
            &inner.properties,
        )?;
        create_and_link_delta(
            self.txn,
            ElementHandle::Vertex(self.vertex.clone()),
            &mut inner.delta,
            DeltaAction::AddLabel(label),
            None,
            ts,
        )?;
        inner.labels.retain(|l| *l != label);
        self.txn.advance_command();
        Ok(true)
    }

    /// Value of `key` as of `view`; `Null` when absent.
    pub fn get_property(&self, key: PropertyId, view: View) -> Result<PropertyValue> {
        let (mut deleted, mut value, head) = {
            let inner = self.vertex.inner.lock();
            (
                inner.deleted,
                inner.properties.get(&key).cloned().unwrap_or_default(),
                inner.delta.clone(),
            )
        };
        let mut exists = true;
        apply_deltas_for_read(self.txn, head, view, |entry| match &entry.action {
            DeltaAction::SetProperty { key: k, prior } if *k == key => value = prior.clone(),
            DeltaAction::RecreateObject => deleted = false,
            DeltaAction::DeleteObject => exists = false,
            _ => {}
        });
        if !exists {
            return Err(GraphError::NonexistentObject);
        }
        if deleted && !self.for_deleted {
            return Err(GraphError::DeletedObject);
        }
        Ok(value)
    }

    /// Full property mapping as of `view`.
    pub fn properties(&self, view: View) -> Result<PropertyMap> {
        let (mut deleted, mut properties, head) = {
            let inner = self.vertex.inner.lock();
            (inner.deleted, inner.properties.clone(), inner.delta.clone())
        };
        let mut exists = true;
        apply_deltas_for_read(self.txn, head, view, |entry| match &entry.action {
            // Newest-first walk: the oldest replayed assignment lands last
            // and wins, reconstructing the pre-change mapping.
            DeltaAction::SetProperty { key, prior } => {
                if prior.is_null() {
                    properties.remove(key);
                } else {
                    properties.insert(*key, prior.clone());
                }
            }
            DeltaAction::RecreateObject => deleted = false,
            DeltaAction::DeleteObject => exists = false,
            _ => {}
        });
        if !exists {
            return Err(GraphError::NonexistentObject);
        }
        if deleted && !self.for_deleted {
            return Err(GraphError::DeletedObject);
        }
        Ok(properties)
    }

    /// Assigns `value` to `key` and returns the previous value. Assigning
    /// `Null` removes the key.
    pub fn set_property(&self, key: PropertyId, value: PropertyValue) -> Result<PropertyValue> {
        let mut guard = self.vertex.inner.lock();
        let inner = &mut *guard;
        prepare_for_write(self.txn, inner.delta.as_ref(), inner.deleted)?;
        let info = ElementInfo::Vertex {
            gid: self.vertex.gid,
        };
        let ts = stamp_write(
            self.txn,
            self.txn.store().config(),
            &info,
            inner.delta.as_ref(),
            inner.transaction_st,
            &mut inner.churn,
            &inner.properties,
        )?;
        let prior = inner.properties.get(&key).cloned().unwrap_or_default();
        create_and_link_delta(
            self.txn,
            ElementHandle::Vertex(self.vertex.clone()),
            &mut inner.delta,
            DeltaAction::SetProperty {
                key,
                prior: prior.clone(),
            },
            None,
            ts,
        )?;
        if value.is_null() {
            inner.properties.remove(&key);
        } else {
            inner.properties.insert(key, value);
        }
        self.txn.advance_command();
        Ok(prior)
    }

    /// Removes every property and returns the removed mapping.
    pub fn clear_properties(&self) -> Result<PropertyMap> {
        let mut guard = self.vertex.inner.lock();
        let inner = &mut *guard;
        prepare_for_write(self.txn, inner.delta.as_ref(), inner.deleted)?;
        let info = ElementInfo::Vertex {
            gid: self.vertex.gid,
        };
        let ts = stamp_write(
            self.txn,
            self.txn.store().config(),
            &info,
            inner.delta.as_ref(),
            inner.transaction_st,
            &mut inner.churn,
            &inner.properties,
        )?;
        let prior = mem::take(&mut inner.properties);
        for (key, value) in &prior {
            create_and_link_delta(
                self.txn,
                ElementHandle::Vertex(self.vertex.clone()),
                &mut inner.delta,
                DeltaAction::SetProperty {
                    key: *key,
                    prior: value.clone(),
                },
                None,
                ts,
            )?;
        }
        self.txn.advance_command();
        Ok(prior)
    }

    /// Incoming edges as of `view`.
    ///
    /// Traversal requires a live vertex: unlike property and label reads,
    /// it fails with [`GraphError::DeletedObject`] even with the tombstone
    /// pass-through.
    pub fn in_edges(&self, view: View) -> Result<Vec<EdgeAccessor<'a, 'db>>> {
        self.edges(Direction::In, view)
    }

    /// Outgoing edges as of `view`. Fails on a tombstoned vertex like
    /// [`Self::in_edges`].
    pub fn out_edges(&self, view: View) -> Result<Vec<EdgeAccessor<'a, 'db>>> {
        self.edges(Direction::Out, view)
    }

    /// Incoming edge count as of `view`. Fails on a tombstoned vertex like
    /// [`Self::in_edges`].
    pub fn in_degree(&self, view: View) -> Result<usize> {
        Ok(self.adjacency(Direction::In, view)?.len())
    }

    /// Outgoing edge count as of `view`. Fails on a tombstoned vertex like
    /// [`Self::in_edges`].
    pub fn out_degree(&self, view: View) -> Result<usize> {
        Ok(self.adjacency(Direction::Out, view)?.len())
    }

    fn edges(&self, direction: Direction, view: View) -> Result<Vec<EdgeAccessor<'a, 'db>>> {
        let store = self.txn.store();
        self.adjacency(direction, view)?
            .into_iter()
            .map(|entry| {
                store
                    .edge_by_gid(entry.edge)
                    .map(|edge| EdgeAccessor::new(edge, self.txn, false))
                    .ok_or(GraphError::NonexistentObject)
            })
            .collect()
    }

    fn adjacency(&self, direction: Direction, view: View) -> Result<Vec<AdjacencyEntry>> {
        let (mut deleted, mut entries, head) = {
            let inner = self.vertex.inner.lock();
            let list = match direction {
                Direction::In => inner.in_edges.clone(),
                Direction::Out => inner.out_edges.clone(),
            };
            (inner.deleted, list, inner.delta.clone())
        };
        let mut exists = true;
        apply_deltas_for_read(self.txn, head, view, |entry| match (&direction, &entry.action) {
            (Direction::In, DeltaAction::AddInEdge(e))
            | (Direction::Out, DeltaAction::AddOutEdge(e)) => {
                if !entries.contains(e) {
                    entries.push(*e);
                }
            }
            (Direction::In, DeltaAction::RemoveInEdge(e))
            | (Direction::Out, DeltaAction::RemoveOutEdge(e)) => entries.retain(|x| x != e),
            (_, DeltaAction::RecreateObject) => deleted = false,
            (_, DeltaAction::DeleteObject) => exists = false,
            _ => {}
        });
        if !exists {
            return Err(GraphError::NonexistentObject);
        }
        if deleted {
            return Err(GraphError::DeletedObject);
        }
        Ok(entries)
    }
}
