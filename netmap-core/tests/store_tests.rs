// Tests for the embedded graph store

use netmap_core::error::NetworkMapError;
use netmap_core::keys;
use netmap_core::model::{Node, NodeKind};
use netmap_core::store::{Direction, GraphStore};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn create_test_store() -> (TempDir, GraphStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = GraphStore::open(&temp_dir.path().join("_resource"), "1_1").unwrap();
    (temp_dir, store)
}

fn url_node(id: i64, url: &str) -> Node {
    let mut node = Node::new_url(id, url);
    node.content_type = Some("text/html".to_string());
    node.status_code = 200;
    node.content_length = 100;
    node
}

// ============================================================================
// Open / Close Tests
// ============================================================================

#[test]
fn test_open_creates_backing_files() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("a").join("b");
    let store = GraphStore::open(&dir, "7_1").unwrap();
    assert!(dir.join("7_1.db").exists());
    assert_eq!(store.name(), "7_1");
    assert_eq!(store.dir(), dir.as_path());
}

#[test]
fn test_close_is_idempotent() {
    let (_temp_dir, store) = create_test_store();
    assert!(!store.is_closed());
    store.close().unwrap();
    assert!(store.is_closed());
    store.close().unwrap();
}

#[test]
fn test_operations_after_close_fail() {
    let (_temp_dir, store) = create_test_store();
    store.close().unwrap();
    let err = store.get(b"1/1").unwrap_err();
    assert!(matches!(err, NetworkMapError::Closed(_)));
}

#[test]
fn test_concurrent_close() {
    let (_temp_dir, store) = create_test_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.close())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(store.is_closed());
}

#[test]
fn test_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("_resource");
    {
        let store = GraphStore::open(&dir, "1_1").unwrap();
        store.put(b"1/1", b"value").unwrap();
        store.close().unwrap();
    }
    let store = GraphStore::open(&dir, "1_1").unwrap();
    assert_eq!(store.get(b"1/1").unwrap(), Some(b"value".to_vec()));
}

// ============================================================================
// Put / Get / Delete Tests
// ============================================================================

#[test]
fn test_put_get() {
    let (_temp_dir, store) = create_test_store();
    store.put(b"1/1", b"hello").unwrap();
    assert_eq!(store.get(b"1/1").unwrap(), Some(b"hello".to_vec()));
}

#[test]
fn test_get_missing_key() {
    let (_temp_dir, store) = create_test_store();
    assert_eq!(store.get(b"1/404").unwrap(), None);
}

#[test]
fn test_put_overwrites() {
    let (_temp_dir, store) = create_test_store();
    store.put(b"k", b"one").unwrap();
    store.put(b"k", b"two").unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"two".to_vec()));
}

#[test]
fn test_delete() {
    let (_temp_dir, store) = create_test_store();
    store.put(b"k", b"v").unwrap();
    assert!(store.delete(b"k").unwrap());
    assert!(!store.delete(b"k").unwrap());
    assert_eq!(store.get(b"k").unwrap(), None);
}

// ============================================================================
// Bulk Insert Tests
// ============================================================================

#[test]
fn test_bulk_insert() {
    let (_temp_dir, store) = create_test_store();
    let records: Vec<(Vec<u8>, Vec<u8>)> = (1..=100)
        .map(|i| (format!("1/{}", i).into_bytes(), format!("v{}", i).into_bytes()))
        .collect();

    assert_eq!(store.bulk_insert(records).unwrap(), 100);
    assert_eq!(store.get(b"1/57").unwrap(), Some(b"v57".to_vec()));
}

#[test]
fn test_bulk_insert_on_closed_store_writes_nothing() {
    let (_temp_dir, store) = create_test_store();
    store.close().unwrap();
    let records = vec![(b"a".to_vec(), b"1".to_vec())];
    assert!(store.bulk_insert(records).is_err());
}

#[test]
fn test_bulk_insert_failure_rolls_back_batch() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("_resource");
    let store = GraphStore::open(&dir, "1_1").unwrap();
    store.put(b"1/1", b"old").unwrap();

    // Reject key "1/3" from a second connection on the same database
    {
        let conn = rusqlite::Connection::open(dir.join("1_1.db")).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_key BEFORE INSERT ON records
             WHEN NEW.key = X'312F33'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
    }

    let records: Vec<(Vec<u8>, Vec<u8>)> = (1..=5)
        .map(|i| (format!("1/{}", i).into_bytes(), b"new".to_vec()))
        .collect();
    let err = store.bulk_insert(records).unwrap_err();
    assert!(matches!(err, NetworkMapError::Store(_)));

    assert_eq!(store.get(b"1/1").unwrap(), Some(b"old".to_vec()));
    assert_eq!(store.get(b"1/2").unwrap(), None);
    assert_eq!(store.get(b"1/5").unwrap(), None);

    // The store stays usable after the rollback
    store.put(b"1/2", b"later").unwrap();
    assert_eq!(store.get(b"1/2").unwrap(), Some(b"later".to_vec()));
}

// ============================================================================
// Typed Helper Tests
// ============================================================================

#[test]
fn test_node_round_trip() {
    let (_temp_dir, store) = create_test_store();
    let mut node = url_node(4, "http://a.example/page");
    node.via_url = Some("http://a.example/".to_string());
    node.parent_id = 1;
    node.domain_id = 9;
    node.outlinks = vec![5, 6];
    node.offset = 1234;
    node.request_parsed = true;
    node.response_parsed = true;
    node.accumulate(200, 100);

    store.put_node(1, &node).unwrap();
    assert_eq!(store.get_node(1, 4).unwrap(), Some(node));
}

#[test]
fn test_domain_round_trip_keeps_buckets() {
    let (_temp_dir, store) = create_test_store();
    let mut domain = Node::new_domain(10, "a.example");
    domain.accumulate_as_children(200, 100, Some("text/html"));
    domain.accumulate_as_children(404, 0, Some("text/html"));

    store.put_node(1, &domain).unwrap();
    let loaded = store.get_node(1, 10).unwrap().unwrap();
    assert_eq!(loaded, domain);
    assert_eq!(loaded.children["text/html"].children.len(), 2);
}

#[test]
fn test_stored_encoding_is_compact_json() {
    let (_temp_dir, store) = create_test_store();
    store.put_node(1, &url_node(1, "http://a.example/")).unwrap();
    let raw = String::from_utf8(store.get(b"1/1").unwrap().unwrap()).unwrap();
    assert!(!raw.contains(' '));
    assert!(raw.contains("\"contentType\":\"text/html\""));
    assert!(raw.contains("\"kind\":\"url\""));
    assert!(raw.contains("\"parentId\":-1"));
}

#[test]
fn test_ids_round_trip() {
    let (_temp_dir, store) = create_test_store();
    store.put_ids(1, keys::ROOT_URL_LIST, &[1, 2, 3]).unwrap();
    assert_eq!(store.get_ids(1, keys::ROOT_URL_LIST).unwrap(), vec![1, 2, 3]);
    assert!(store.get_ids(1, keys::MALFORMED_URL_LIST).unwrap().is_empty());
}

// ============================================================================
// Range Iteration Tests
// ============================================================================

fn populate(store: &GraphStore) {
    for id in 1..=150 {
        store
            .put_node(1, &url_node(id, &format!("http://a.example/{}", id)))
            .unwrap();
    }
    store.put_node(1, &Node::new_domain(151, "a.example")).unwrap();
    store.put_ids(1, keys::ROOT_URL_LIST, &[1]).unwrap();
}

#[test]
fn test_range_iter_forward_from_start() {
    let (_temp_dir, store) = create_test_store();
    populate(&store);

    let urls: Vec<Node> = store
        .range_iter(b"1/", Direction::Forward, NodeKind::Url)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(urls.len(), 150);
    assert!(urls.iter().all(|n| n.kind == NodeKind::Url));

    // Keys compare bytewise, so "1/10" sorts before "1/2"
    assert_eq!(urls[0].id, 1);
    assert_eq!(urls[1].id, 10);
}

#[test]
fn test_range_iter_filters_kind() {
    let (_temp_dir, store) = create_test_store();
    populate(&store);

    let domains: Vec<Node> = store
        .range_iter(b"1/", Direction::Forward, NodeKind::Domain)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].url, "a.example");
}

#[test]
fn test_range_iter_starts_at_key() {
    let (_temp_dir, store) = create_test_store();
    populate(&store);

    let mut iter = store.range_iter(b"1/5", Direction::Forward, NodeKind::Url);
    assert_eq!(iter.next().unwrap().unwrap().id, 5);
    assert_eq!(iter.next().unwrap().unwrap().id, 50);
}

#[test]
fn test_range_iter_backward() {
    let (_temp_dir, store) = create_test_store();
    populate(&store);

    let ids: Vec<i64> = store
        .range_iter(b"1/2", Direction::Backward, NodeKind::Url)
        .map(|n| n.unwrap().id)
        .collect();
    // Everything strictly below "1/2": "1/1", "1/10".."1/19", "1/100".."1/150"
    assert_eq!(ids.len(), 1 + 10 + 51);
    assert_eq!(ids[0], 19);
    assert_eq!(*ids.last().unwrap(), 1);
}

#[test]
fn test_range_iter_empty_store() {
    let (_temp_dir, store) = create_test_store();
    assert!(
        store
            .range_iter(b"", Direction::Forward, NodeKind::Url)
            .next()
            .is_none()
    );
}

#[test]
fn test_range_iter_reports_corrupt_nodes() {
    let (_temp_dir, store) = create_test_store();
    store.put_node(1, &url_node(1, "http://a.example/")).unwrap();
    store.put(b"1/2", br#"{"kind":"url","id":"two"}"#).unwrap();
    store.put_node(1, &url_node(3, "http://a.example/3")).unwrap();
    store.put_ids(1, keys::ROOT_URL_LIST, &[1]).unwrap();
    store.put(b"1/build-complete", br#"{"completedAt":"2024-01-01T00:00:00Z"}"#).unwrap();

    let results: Vec<_> = store
        .range_iter(b"1/", Direction::Forward, NodeKind::Url)
        .within(b"1/")
        .collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().id, 1);
    assert!(matches!(results[1], Err(NetworkMapError::Serialization(_))));
    assert_eq!(results[2].as_ref().unwrap().id, 3);
}

#[test]
fn test_range_iter_within_prefix() {
    let (_temp_dir, store) = create_test_store();
    store.put_node(1, &url_node(1, "http://a.example/")).unwrap();
    store.put_node(10, &url_node(1, "http://other.example/")).unwrap();

    let all = store.range_iter(b"1/", Direction::Forward, NodeKind::Url).count();
    let scoped = store
        .range_iter(b"1/", Direction::Forward, NodeKind::Url)
        .within(b"1/")
        .count();
    assert_eq!(all, 2);
    assert_eq!(scoped, 1);
}
