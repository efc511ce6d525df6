//! Read and write surface of a single edge within one transaction.
//!
//! Edges never carry labels or adjacency of their own; besides the
//! immutable endpoint identities, properties are the whole surface. When
//! the store runs with `properties_on_edges` off, reads answer
//! `Null`/empty without touching the version chain and writes fail with
//! [`GraphError::PropertiesDisabled`].

use std::mem;
use std::sync::Arc;

use crate::db::transaction::{ElementHandle, Transaction};
use crate::db::vertex_accessor::VertexAccessor;
use crate::error::{GraphError, Result};
use crate::storage::delta::{DeltaAction, EdgeEndpoints};
use crate::storage::edge::Edge;
use crate::storage::mvcc::{
    apply_deltas_for_read, create_and_link_delta, prepare_for_write, stamp_write, ElementInfo,
    View,
};
use crate::storage::property_value::{PropertyMap, PropertyValue};
use crate::storage::types::{EdgeTypeId, Gid, PropertyId};

/// Handle to one edge, scoped to the transaction that produced it.
pub struct EdgeAccessor<'a, 'db> {
    edge: Arc<Edge>,
    txn: &'a Transaction<'db>,
    for_deleted: bool,
}

impl<'a, 'db> EdgeAccessor<'a, 'db> {
    pub(crate) fn new(edge: Arc<Edge>, txn: &'a Transaction<'db>, for_deleted: bool) -> Self {
        Self {
            edge,
            txn,
            for_deleted,
        }
    }

    pub(crate) fn edge(&self) -> &Arc<Edge> {
        &self.edge
    }

    /// The edge's identity.
    pub fn gid(&self) -> Gid {
        self.edge.gid
    }

    /// The edge's interned type.
    pub fn edge_type(&self) -> EdgeTypeId {
        self.edge.edge_type
    }

    /// Accessor for the origin vertex.
    pub fn from_vertex(&self) -> Result<VertexAccessor<'a, 'db>> {
        self.txn
            .store()
            .vertex_by_gid(self.edge.from)
            .map(|vertex| VertexAccessor::new(vertex, self.txn, false))
            .ok_or(GraphError::NonexistentObject)
    }

    /// Accessor for the destination vertex.
    pub fn to_vertex(&self) -> Result<VertexAccessor<'a, 'db>> {
        self.txn
            .store()
            .vertex_by_gid(self.edge.to)
            .map(|vertex| VertexAccessor::new(vertex, self.txn, false))
            .ok_or(GraphError::NonexistentObject)
    }

    /// Whether this edge exists and is not deleted as of `view`.
    pub fn is_visible(&self, view: View) -> bool {
        let (mut deleted, head) = {
            let inner = self.edge.inner.lock();
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

    /// Value of `key` as of `view`; `Null` when absent or when edge
    /// properties are disabled.
    pub fn get_property(&self, key: PropertyId, view: View) -> Result<PropertyValue> {
        if !self.txn.store().config().properties_on_edges {
            return Ok(PropertyValue::Null);
        }
        let (mut deleted, mut value, head) = {
            let inner = self.edge.inner.lock();
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

    /// Full property mapping as of `view`; empty when edge properties are
    /// disabled.
    pub fn properties(&self, view: View) -> Result<PropertyMap> {
        if !self.txn.store().config().properties_on_edges {
            return Ok(PropertyMap::new());
        }
        let (mut deleted, mut properties, head) = {
            let inner = self.edge.inner.lock();
            (inner.deleted, inner.properties.clone(), inner.delta.clone())
        };
        let mut exists = true;
        apply_deltas_for_read(self.txn, head, view, |entry| match &entry.action {
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
    pub fn set_property(
        &self,
        key: PropertyId,
        value: PropertyValue,
    ) -> Result<PropertyValue> {
        if !self.txn.store().config().properties_on_edges {
            return Err(GraphError::PropertiesDisabled);
        }
        let mut guard = self.edge.inner.lock();
        let inner = &mut *guard;
        prepare_for_write(self.txn, inner.delta.as_ref(), inner.deleted)?;
        let info = self.info();
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
            ElementHandle::Edge(self.edge.clone()),
            &mut inner.delta,
            DeltaAction::SetProperty {
                key,
                prior: prior.clone(),
            },
            Some(self.endpoints()),
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
        if !self.txn.store().config().properties_on_edges {
            return Err(GraphError::PropertiesDisabled);
        }
        let mut guard = self.edge.inner.lock();
        let inner = &mut *guard;
        prepare_for_write(self.txn, inner.delta.as_ref(), inner.deleted)?;
        let info = self.info();
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
                ElementHandle::Edge(self.edge.clone()),
                &mut inner.delta,
                DeltaAction::SetProperty {
                    key: *key,
                    prior: value.clone(),
                },
                Some(self.endpoints()),
                ts,
            )?;
        }
        self.txn.advance_command();
        Ok(prior)
    }

    fn endpoints(&self) -> EdgeEndpoints {
        EdgeEndpoints {
            from: self.edge.from,
            to: self.edge.to,
            edge_type: self.edge.edge_type,
        }
    }

    fn info(&self) -> ElementInfo {
        ElementInfo::Edge {
            gid: self.edge.gid,
            endpoints: self.endpoints(),
        }
    }
}
