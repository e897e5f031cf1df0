//! List semantics of the in-memory store.

use jobby::Error;
use jobby::store::{ListStore, MemoryStore};
use std::time::Duration;

#[tokio::test]
async fn push_prepends_and_move_takes_the_oldest() {
    let store = MemoryStore::new();
    store.push("q:waiting", b"first").await.unwrap();
    store.push("q:waiting", b"second").await.unwrap();
    assert_eq!(
        store.range("q:waiting").await.unwrap(),
        vec![b"second".to_vec(), b"first".to_vec()]
    );

    let moved = store.atomic_move("q:waiting", "q:working").await.unwrap();
    assert_eq!(moved, b"first");
    assert_eq!(store.snapshot("q:waiting"), vec![b"second".to_vec()]);
    assert_eq!(store.snapshot("q:working"), vec![b"first".to_vec()]);
}

#[tokio::test]
async fn remove_one_drops_a_single_copy() {
    let store = MemoryStore::new();
    store.push("list", b"dup").await.unwrap();
    store.push("list", b"other").await.unwrap();
    store.push("list", b"dup").await.unwrap();

    assert!(store.remove_one("list", b"dup").await.unwrap());
    assert_eq!(store.len("list"), 2);
    assert!(store.remove_one("list", b"dup").await.unwrap());
    assert!(!store.remove_one("list", b"dup").await.unwrap());
    assert!(!store.remove_one("missing", b"dup").await.unwrap());
    assert_eq!(store.snapshot("list"), vec![b"other".to_vec()]);
}

#[tokio::test]
async fn move_blocks_until_another_handle_pushes() {
    let popper = MemoryStore::new();
    let pusher = popper.connection();

    let waiting = tokio::spawn({
        let popper = popper.clone();
        async move { popper.atomic_move("q:waiting", "q:working").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiting.is_finished());

    pusher.push("q:waiting", b"job").await.unwrap();
    let moved = tokio::time::timeout(Duration::from_secs(2), waiting)
        .await
        .expect("move woke up")
        .unwrap()
        .unwrap();
    assert_eq!(moved, b"job");
    assert_eq!(pusher.len("q:working"), 1);
}

#[tokio::test]
async fn close_aborts_a_blocked_move_and_later_calls() {
    let popper = MemoryStore::new();
    let pusher = popper.connection();

    let blocked = tokio::spawn({
        let popper = popper.clone();
        async move { popper.atomic_move("q:waiting", "q:working").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    popper.close().await;

    let result = tokio::time::timeout(Duration::from_secs(2), blocked)
        .await
        .expect("move aborted")
        .unwrap();
    assert!(matches!(result, Err(Error::Closed)));
    assert!(matches!(popper.push("q:waiting", b"x").await, Err(Error::Closed)));

    // Closing one handle leaves the other usable.
    assert!(!pusher.is_closed());
    pusher.push("q:waiting", b"x").await.unwrap();
}

#[tokio::test]
async fn injected_failures_are_transient_and_counted_down() {
    let store = MemoryStore::new();
    store.fail_next(2);

    let first = store.push("list", b"a").await.unwrap_err();
    assert!(first.is_transient());
    assert!(store.range("list").await.is_err());
    store.push("list", b"a").await.unwrap();
    assert_eq!(store.len("list"), 1);
}
