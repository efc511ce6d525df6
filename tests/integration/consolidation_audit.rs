//! Consolidation cadence, anchor contents, and the audit stream.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tenebra::{
    Config, ElementKind, GraphStore, PropertyId, PropertyValue, View,
};

const SCORE: PropertyId = PropertyId(1);

fn store_with_vertex(config: Config) -> (GraphStore, tenebra::Gid, u64) {
    let store = GraphStore::new(config).unwrap();
    let (gid, create_ts) = {
        let txn = store.begin_transaction();
        let vertex = txn.create_vertex().unwrap();
        let gid = vertex.gid();
        drop(vertex);
        let receipt = txn.commit().unwrap();
        (gid, receipt.start_ts.unwrap())
    };
    (store, gid, create_ts)
}

/// Runs one committed transaction that writes `value` to the vertex and
/// returns the commit receipt.
fn write_once(
    store: &GraphStore,
    gid: tenebra::Gid,
    value: i64,
) -> tenebra::CommitReceipt {
    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    vertex
        .set_property(SCORE, PropertyValue::from(value))
        .unwrap();
    drop(vertex);
    txn.commit().unwrap()
}

#[test]
fn anchor_fires_on_the_nth_commit_boundary() {
    let config = Config {
        anchor_churn_threshold: 3,
        ..Config::default()
    };
    let (store, gid, _) = store_with_vertex(config);

    let r1 = write_once(&store, gid, 1);
    assert!(r1.vertex_anchors.is_empty());
    let r2 = write_once(&store, gid, 2);
    assert!(r2.vertex_anchors.is_empty());

    let r3 = write_once(&store, gid, 3);
    assert_eq!(r3.vertex_anchors.len(), 1);
    let ((anchor_gid, anchor_ts), snapshot) = r3.vertex_anchors.iter().next().unwrap();
    assert_eq!(*anchor_gid, gid);
    // The anchor is keyed by the start-time of the state it consolidates,
    // which is the second writer's commit, and holds the pre-image.
    assert_eq!(*anchor_ts, r2.start_ts.unwrap());
    assert_eq!(snapshot.get(&SCORE), Some(&PropertyValue::from(2i64)));

    // The cadence resets; the next two boundaries stay quiet.
    assert!(write_once(&store, gid, 4).vertex_anchors.is_empty());
    assert!(write_once(&store, gid, 5).vertex_anchors.is_empty());
    assert_eq!(write_once(&store, gid, 6).vertex_anchors.len(), 1);
}

#[test]
fn anchoring_never_changes_observable_state() {
    let config = Config {
        anchor_churn_threshold: 1,
        ..Config::default()
    };
    let (store, gid, _) = store_with_vertex(config);

    for value in 0..5i64 {
        let receipt = write_once(&store, gid, value);
        assert_eq!(receipt.vertex_anchors.len(), 1);
        let txn = store.begin_transaction();
        let vertex = txn.vertex(gid, View::New).unwrap();
        assert_eq!(
            vertex.get_property(SCORE, View::New).unwrap(),
            PropertyValue::from(value)
        );
    }
}

#[test]
fn anchors_are_checkpoints_old_history_stays_replayable() {
    let config = Config {
        anchor_churn_threshold: 1,
        ..Config::default()
    };
    let (store, gid, _) = store_with_vertex(config);
    write_once(&store, gid, 1);

    let reader = store.begin_transaction();
    write_once(&store, gid, 2);
    write_once(&store, gid, 3);

    // The reader's snapshot predates two anchored commits and still
    // resolves through the chain.
    let vertex = reader.vertex(gid, View::New).unwrap();
    assert_eq!(
        vertex.get_property(SCORE, View::New).unwrap(),
        PropertyValue::from(1i64)
    );
}

#[test]
fn audit_captures_the_pre_image_at_each_commit_boundary() {
    let (store, gid, create_ts) = store_with_vertex(Config::default());

    let r1 = write_once(&store, gid, 10);
    assert_eq!(r1.audit.len(), 1);
    assert_eq!(r1.audit[0].kind, ElementKind::Vertex);
    assert_eq!(r1.audit[0].gid, gid);
    assert_eq!(r1.audit[0].endpoints, None);
    assert_eq!(r1.audit[0].prior_start_ts, create_ts);
    assert!(r1.audit[0].properties.is_empty());

    let r2 = write_once(&store, gid, 20);
    assert_eq!(r2.audit.len(), 1);
    assert_eq!(r2.audit[0].prior_start_ts, r1.start_ts.unwrap());
    assert_eq!(
        r2.audit[0].properties.get(&SCORE),
        Some(&PropertyValue::from(10i64))
    );
}

#[test]
fn repeat_writes_in_one_transaction_audit_once() {
    let (store, gid, _) = store_with_vertex(Config::default());
    write_once(&store, gid, 1);

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    vertex.set_property(SCORE, PropertyValue::from(2i64)).unwrap();
    vertex.set_property(SCORE, PropertyValue::from(3i64)).unwrap();
    vertex.set_property(SCORE, PropertyValue::from(4i64)).unwrap();
    drop(vertex);
    let receipt = txn.commit().unwrap();
    assert_eq!(receipt.audit.len(), 1);
}

#[test]
fn audit_orders_records_by_write_order_across_elements() {
    let store = GraphStore::new(Config::default()).unwrap();
    let (a_gid, b_gid, e_gid) = {
        let txn = store.begin_transaction();
        let a = txn.create_vertex().unwrap();
        let b = txn.create_vertex().unwrap();
        let e = txn.create_edge(&a, &b, tenebra::EdgeTypeId(4)).unwrap();
        let gids = (a.gid(), b.gid(), e.gid());
        drop((a, b, e));
        txn.commit().unwrap();
        gids
    };

    let txn = store.begin_transaction();
    let edge = txn.edge(e_gid, View::New).unwrap();
    edge.set_property(SCORE, PropertyValue::from(1i64)).unwrap();
    let b = txn.vertex(b_gid, View::New).unwrap();
    b.set_property(SCORE, PropertyValue::from(2i64)).unwrap();
    drop((edge, b));
    let receipt = txn.commit().unwrap();

    assert_eq!(receipt.audit.len(), 2);
    assert_eq!(receipt.audit[0].kind, ElementKind::Edge);
    assert_eq!(receipt.audit[0].gid, e_gid);
    let endpoints = receipt.audit[0].endpoints.unwrap();
    assert_eq!(endpoints.from, a_gid);
    assert_eq!(endpoints.to, b_gid);
    assert_eq!(receipt.audit[1].kind, ElementKind::Vertex);
    assert_eq!(receipt.audit[1].gid, b_gid);
}

#[test]
fn aborted_transactions_discard_audit_and_anchors() {
    let config = Config {
        anchor_churn_threshold: 1,
        ..Config::default()
    };
    let (store, gid, _) = store_with_vertex(config);
    write_once(&store, gid, 1);

    let txn = store.begin_transaction();
    let vertex = txn.vertex(gid, View::New).unwrap();
    vertex.set_property(SCORE, PropertyValue::from(99i64)).unwrap();
    drop(vertex);
    txn.rollback();

    // The next committed write still audits against the last commit.
    let receipt = write_once(&store, gid, 2);
    assert_eq!(receipt.audit.len(), 1);
    assert_eq!(
        receipt.audit[0].properties.get(&SCORE),
        Some(&PropertyValue::from(1i64))
    );
}

#[test]
fn bare_config_disables_audit_and_anchors() {
    let (store, gid, _) = store_with_vertex(Config::bare());
    for value in 0..40i64 {
        let receipt = write_once(&store, gid, value);
        assert!(receipt.audit.is_empty());
        assert!(receipt.vertex_anchors.is_empty());
    }
}

#[test]
fn audit_buffer_serializes_for_external_sinks() {
    let (store, gid, _) = store_with_vertex(Config::default());
    write_once(&store, gid, 7);
    let receipt = write_once(&store, gid, 8);

    let json = serde_json::to_string(&receipt.audit).unwrap();
    let parsed: Vec<tenebra::AuditRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, receipt.audit);
}

#[test]
fn randomized_history_matches_a_shadow_model() {
    let config = Config {
        anchor_churn_threshold: 2,
        ..Config::default()
    };
    let (store, gid, _) = store_with_vertex(config);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut shadow: Option<i64> = None;

    for _ in 0..200 {
        let txn = store.begin_transaction();
        let vertex = txn.vertex(gid, View::New).unwrap();
        let next: i64 = rng.gen_range(0..1000);
        let commit = rng.gen_bool(0.8);
        vertex
            .set_property(SCORE, PropertyValue::from(next))
            .unwrap();
        drop(vertex);
        if commit {
            txn.commit().unwrap();
            shadow = Some(next);
        } else {
            txn.rollback();
        }

        let check = store.begin_transaction();
        let vertex = check.vertex(gid, View::New).unwrap();
        let expected = shadow.map(PropertyValue::from).unwrap_or_default();
        assert_eq!(vertex.get_property(SCORE, View::New).unwrap(), expected);
    }
}
