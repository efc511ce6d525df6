//! Snapshot isolation and write-write conflict behavior across
//! transactions.

use std::sync::Barrier;
use std::thread;

use tenebra::{
    Config, GraphError, GraphStore, LabelId, PropertyId, PropertyValue, View,
};

const NAME: PropertyId = PropertyId(1);
const AGE: PropertyId = PropertyId(2);

fn store_with_vertex() -> (GraphStore, tenebra::Gid) {
    let store = GraphStore::new(Config::default()).unwrap();
    let gid = {
        let txn = store.begin_transaction();
        let vertex = txn.create_vertex().unwrap();
        let gid = vertex.gid();
        drop(vertex);
        txn.commit().unwrap();
        gid
    };
    (store, gid)
}

#[test]
fn own_writes_visible_under_new_view_only() {
    let (store, gid) = store_with_vertex();
    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();

    vertex.set_property(AGE, PropertyValue::from(30i64)).unwrap();
    assert_eq!(
        vertex.get_property(AGE, View::New).unwrap(),
        PropertyValue::from(30i64)
    );
    assert_eq!(
        vertex.get_property(AGE, View::Old).unwrap(),
        PropertyValue::Null
    );
}

#[test]
fn assigning_null_removes_the_key() {
    let (store, gid) = store_with_vertex();
    {
        let txn = store.begin_transaction();
        let vertex = txn.vertex(gid, View::New).unwrap();
        vertex
            .set_property(NAME, PropertyValue::from("nadia"))
            .unwrap();
        drop(vertex);
        txn.commit().unwrap();
    }

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    let prior = vertex.set_property(NAME, PropertyValue::Null).unwrap();
    assert_eq!(prior, PropertyValue::from("nadia"));
    assert!(vertex.properties(View::New).unwrap().is_empty());
    assert_eq!(
        vertex.properties(View::Old).unwrap().get(&NAME),
        Some(&PropertyValue::from("nadia"))
    );
}

#[test]
fn snapshot_is_stable_across_a_concurrent_commit() {
    let (store, gid) = store_with_vertex();

    let reader = store.begin_transaction();

    let writer = store.begin_transaction();
    let vertex = writer.vertex(gid, View::New).unwrap();
    vertex.set_property(AGE, PropertyValue::from(30i64)).unwrap();
    drop(vertex);
    writer.commit().unwrap();

    // The reader's snapshot predates the commit; repeated reads agree.
    let vertex = reader.vertex(gid, View::New).unwrap();
    assert_eq!(
        vertex.get_property(AGE, View::New).unwrap(),
        PropertyValue::Null
    );
    assert_eq!(
        vertex.get_property(AGE, View::New).unwrap(),
        PropertyValue::Null
    );

    // A transaction begun after the commit sees the new value.
    let later = store.begin_transaction();
    let vertex = later.vertex(gid, View::New).unwrap();
    assert_eq!(
        vertex.get_property(AGE, View::New).unwrap(),
        PropertyValue::from(30i64)
    );
}

#[test]
fn second_open_writer_fails_immediately() {
    let (store, gid) = store_with_vertex();

    let t1 = store.begin_transaction();
    let v1 = t1.vertex(gid, View::New).unwrap();
    v1.set_property(AGE, PropertyValue::from(1i64)).unwrap();

    let t2 = store.begin_transaction();
    let v2 = t2.vertex(gid, View::New).unwrap();
    assert_eq!(
        v2.set_property(AGE, PropertyValue::from(2i64)),
        Err(GraphError::SerializationConflict)
    );
    assert_eq!(v2.add_label(LabelId(1)), Err(GraphError::SerializationConflict));
}

#[test]
fn writing_over_committed_state_does_not_conflict() {
    let (store, gid) = store_with_vertex();

    // t2 begins before t1 commits; only open writers conflict.
    let t2 = store.begin_transaction();

    let t1 = store.begin_transaction();
    let v1 = t1.vertex(gid, View::New).unwrap();
    v1.set_property(AGE, PropertyValue::from(1i64)).unwrap();
    drop(v1);
    t1.commit().unwrap();

    let v2 = t2.vertex(gid, View::New).unwrap();
    assert!(v2.set_property(AGE, PropertyValue::from(2i64)).is_ok());
}

#[test]
fn exactly_one_of_two_racing_writers_succeeds() {
    let (store, gid) = store_with_vertex();
    let store = &store;
    let barrier = &Barrier::new(2);

    let outcomes: Vec<bool> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2i64)
            .map(|i| {
                scope.spawn(move || {
                    let txn = store.begin_transaction();
                    let vertex = txn.vertex(gid, View::New).unwrap();
                    barrier.wait();
                    let outcome = vertex.set_property(AGE, PropertyValue::from(i));
                    // Hold both attempts open before either finishes.
                    barrier.wait();
                    let won = match outcome {
                        Ok(_) => true,
                        Err(GraphError::SerializationConflict) => false,
                        Err(other) => panic!("unexpected error: {other}"),
                    };
                    drop(vertex);
                    if won {
                        txn.commit().unwrap();
                    } else {
                        txn.rollback();
                    }
                    won
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|&&won| won).count(), 1);
}

#[test]
fn snapshots_stay_repeatable_while_commits_are_in_flight() {
    let store = GraphStore::new(Config::default()).unwrap();
    let (a_gid, b_gid) = {
        let txn = store.begin_transaction();
        let a = txn.create_vertex().unwrap();
        let b = txn.create_vertex().unwrap();
        a.set_property(AGE, PropertyValue::from(0i64)).unwrap();
        b.set_property(AGE, PropertyValue::from(0i64)).unwrap();
        let gids = (a.gid(), b.gid());
        drop((a, b));
        txn.commit().unwrap();
        gids
    };
    let store = &store;

    thread::scope(|scope| {
        // Both vertices always advance in the same commit, so any snapshot
        // must see them equal, and must keep seeing the same value.
        let writer = scope.spawn(move || {
            for value in 1..=300i64 {
                let txn = store.begin_transaction();
                let a = txn.vertex(a_gid, View::New).unwrap();
                let b = txn.vertex(b_gid, View::New).unwrap();
                a.set_property(AGE, PropertyValue::from(value)).unwrap();
                b.set_property(AGE, PropertyValue::from(value)).unwrap();
                drop((a, b));
                txn.commit().unwrap();
            }
        });

        for _ in 0..300 {
            let txn = store.begin_transaction();
            let a = txn.vertex(a_gid, View::New).unwrap();
            let first = a.get_property(AGE, View::New).unwrap();
            let b = txn.vertex(b_gid, View::New).unwrap();
            let sibling = b.get_property(AGE, View::New).unwrap();
            let again = a.get_property(AGE, View::New).unwrap();
            assert_eq!(first, again, "same transaction read two values");
            assert_eq!(first, sibling, "snapshot split a commit in half");
        }
        writer.join().unwrap();
    });
}

#[test]
fn abort_restores_prior_state_and_releases_the_element() {
    let (store, gid) = store_with_vertex();
    {
        let txn = store.begin_transaction();
        let vertex = txn.vertex(gid, View::New).unwrap();
        vertex
            .set_property(NAME, PropertyValue::from("before"))
            .unwrap();
        drop(vertex);
        txn.commit().unwrap();
    }

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    vertex
        .set_property(NAME, PropertyValue::from("after"))
        .unwrap();
    vertex.add_label(LabelId(7)).unwrap();
    drop(vertex);
    txn.rollback();

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    assert_eq!(
        vertex.get_property(NAME, View::New).unwrap(),
        PropertyValue::from("before")
    );
    assert!(!vertex.has_label(LabelId(7), View::New).unwrap());
    // The aborted writer left no open entry behind.
    assert!(vertex.set_property(AGE, PropertyValue::from(9i64)).is_ok());
}

#[test]
fn clear_properties_empties_the_new_view_and_replays_in_the_old() {
    let (store, gid) = store_with_vertex();
    {
        let txn = store.begin_transaction();
        let vertex = txn.vertex(gid, View::New).unwrap();
        vertex
            .set_property(NAME, PropertyValue::from("iris"))
            .unwrap();
        vertex.set_property(AGE, PropertyValue::from(4i64)).unwrap();
        drop(vertex);
        txn.commit().unwrap();
    }

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    let prior = vertex.clear_properties().unwrap();
    assert_eq!(prior.len(), 2);
    assert_eq!(prior.get(&NAME), Some(&PropertyValue::from("iris")));
    assert_eq!(prior.get(&AGE), Some(&PropertyValue::from(4i64)));

    assert!(vertex.properties(View::New).unwrap().is_empty());
    assert_eq!(
        vertex.get_property(NAME, View::New).unwrap(),
        PropertyValue::Null
    );
    // Each removed key replays back through its own per-key delta.
    assert_eq!(vertex.properties(View::Old).unwrap(), prior);
    drop(vertex);
    txn.commit().unwrap();

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    assert!(vertex.properties(View::New).unwrap().is_empty());
}

#[test]
fn dropping_an_active_transaction_rolls_it_back() {
    let (store, gid) = store_with_vertex();
    {
        let txn = store.begin_transaction();
        let vertex = txn.vertex(gid, View::New).unwrap();
        vertex.set_property(AGE, PropertyValue::from(5i64)).unwrap();
        // Dropped without commit.
    }

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    assert_eq!(
        vertex.get_property(AGE, View::New).unwrap(),
        PropertyValue::Null
    );
}

#[test]
fn label_changes_follow_the_same_visibility_rules() {
    let (store, gid) = store_with_vertex();
    let label = LabelId(3);

    let reader = store.begin_transaction();

    let writer = store.begin_transaction();
    let vertex = writer.vertex(gid, View::New).unwrap();
    assert!(vertex.add_label(label).unwrap());
    assert!(!vertex.add_label(label).unwrap());
    assert!(vertex.has_label(label, View::New).unwrap());
    assert!(!vertex.has_label(label, View::Old).unwrap());
    drop(vertex);
    writer.commit().unwrap();

    let vertex = reader.vertex(gid, View::New).unwrap();
    assert!(!vertex.has_label(label, View::New).unwrap());

    let later = store.begin_transaction();
    let vertex = later.vertex(gid, View::New).unwrap();
    assert_eq!(vertex.labels(View::New).unwrap(), vec![label]);
}

#[test]
fn deleted_vertex_allows_reads_but_not_writes_via_pass_through() {
    let (store, gid) = store_with_vertex();
    {
        let txn = store.begin_transaction();
        let vertex = txn.vertex(gid, View::New).unwrap();
        vertex
            .set_property(NAME, PropertyValue::from("ghost"))
            .unwrap();
        drop(vertex);
        txn.commit().unwrap();
    }

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    txn.delete_vertex(&vertex).unwrap();
    drop(vertex);

    // The ordinary lookup refuses the tombstoned vertex.
    assert!(txn.vertex(gid, View::New).is_none());

    let vertex = txn.vertex_for_deleted(gid, View::New).unwrap();
    assert_eq!(
        vertex.get_property(NAME, View::New).unwrap(),
        PropertyValue::from("ghost")
    );
    assert_eq!(
        vertex.set_property(NAME, PropertyValue::Null),
        Err(GraphError::DeletedObject)
    );
    assert!(matches!(
        vertex.in_edges(View::New),
        Err(GraphError::DeletedObject)
    ));
    assert!(matches!(
        vertex.out_edges(View::New),
        Err(GraphError::DeletedObject)
    ));
    assert_eq!(vertex.in_degree(View::New), Err(GraphError::DeletedObject));
    assert_eq!(vertex.out_degree(View::New), Err(GraphError::DeletedObject));
}

#[test]
fn edge_properties_respect_the_store_toggle() {
    let store = GraphStore::new(Config::topology_only()).unwrap();
    let txn = store.begin_transaction();
    let a = txn.create_vertex().unwrap();
    let b = txn.create_vertex().unwrap();
    let edge = txn.create_edge(&a, &b, tenebra::EdgeTypeId(1)).unwrap();

    assert_eq!(
        edge.get_property(NAME, View::New).unwrap(),
        PropertyValue::Null
    );
    assert!(edge.properties(View::New).unwrap().is_empty());
    assert_eq!(
        edge.set_property(NAME, PropertyValue::from("x")),
        Err(GraphError::PropertiesDisabled)
    );
    assert_eq!(edge.clear_properties(), Err(GraphError::PropertiesDisabled));
}

#[test]
fn edge_traversal_sees_the_transaction_local_topology() {
    let store = GraphStore::new(Config::default()).unwrap();
    let txn = store.begin_transaction();
    let a = txn.create_vertex().unwrap();
    let b = txn.create_vertex().unwrap();
    let edge = txn.create_edge(&a, &b, tenebra::EdgeTypeId(9)).unwrap();
    edge.set_property(NAME, PropertyValue::from("road"))
        .unwrap();

    let out = a.out_edges(View::New).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].gid(), edge.gid());
    assert_eq!(out[0].edge_type(), tenebra::EdgeTypeId(9));
    assert_eq!(out[0].to_vertex().unwrap().gid(), b.gid());
    assert_eq!(b.in_degree(View::New).unwrap(), 1);
    assert_eq!(b.out_degree(View::New).unwrap(), 0);
    // Nothing of this is visible at the snapshot.
    assert!(matches!(
        a.out_edges(View::Old),
        Err(GraphError::NonexistentObject)
    ));
}
