use std::error::Error;
use std::io;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use protocol_error::{find_fatal, is_fatal, Cause, FatalProtocolError, FatalReport};

#[derive(Debug, thiserror::Error)]
#[error("session aborted")]
struct SessionAborted(#[source] FatalProtocolError);

#[derive(Debug, thiserror::Error)]
#[error("read failed")]
struct ReadFailed {
    #[source]
    source: io::Error,
}

fn chain_of(depth: usize) -> FatalProtocolError {
    (1..depth).fold(FatalProtocolError::new("layer 0"), |cause, i| {
        FatalProtocolError::with_cause(format!("layer {}", i), cause)
    })
}

#[test]
fn test_disk_full_has_no_cause() {
    let e1 = FatalProtocolError::new("disk full");
    assert_eq!(e1.message(), "disk full");
    assert!(e1.cause().is_none());
    assert!(!e1.has_cause());
}

#[test]
fn test_checkpoint_failed_wraps_disk_full() {
    let e1 = FatalProtocolError::new("disk full");
    let e2 = FatalProtocolError::with_cause("checkpoint failed", e1);

    let cause = e2
        .cause()
        .and_then(|c| c.downcast_ref::<FatalProtocolError>())
        .expect("cause should be the original fatal error");
    assert_eq!(cause.message(), "disk full");
    assert!(cause.cause().is_none());
}

#[test]
fn test_shared_cause_keeps_identity() {
    let e1: Cause = Arc::new(FatalProtocolError::new("disk full"));
    let e2 = FatalProtocolError::with_shared_cause("checkpoint failed", Arc::clone(&e1));

    let stored = e2.shared_cause().expect("cause should be present");
    assert!(Arc::ptr_eq(stored, &e1));

    let via_source = e2.source().expect("source should be the cause");
    assert!(std::ptr::addr_eq(
        via_source as *const dyn Error,
        Arc::as_ptr(&e1),
    ));
}

#[test]
fn test_clone_shares_cause() {
    let err = FatalProtocolError::with_cause("share verification failed", io::Error::other("short read"));
    let copy = err.clone();
    assert!(Arc::ptr_eq(
        err.shared_cause().unwrap(),
        copy.shared_cause().unwrap()
    ));
}

#[test]
fn test_empty_message_is_kept() {
    let err = FatalProtocolError::new("");
    assert_eq!(err.message(), "");
    assert_eq!(err.to_string(), "");
}

#[test]
fn test_foreign_cause_is_root() {
    let err = FatalProtocolError::with_cause(
        "bulletin board unreachable",
        io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
    );
    assert_eq!(err.depth(), 2);
    let root = err.root_cause();
    assert_eq!(root.to_string(), "connection refused");
    assert_eq!(
        root.downcast_ref::<io::Error>().map(|e| e.kind()),
        Some(io::ErrorKind::ConnectionRefused)
    );
}

#[test]
fn test_boxed_anyhow_cause() {
    let cause = anyhow::anyhow!("malformed group element");
    let err = FatalProtocolError::with_boxed_cause("proof rejected", cause.into());
    assert_eq!(format!("{:#}", err), "proof rejected: malformed group element");
}

#[test]
fn test_find_fatal_through_foreign_wrapper() {
    let wrapped = SessionAborted(FatalProtocolError::new("invariant broken"));
    assert!(is_fatal(&wrapped));
    assert_eq!(find_fatal(&wrapped).map(|e| e.message()), Some("invariant broken"));

    let plain = io::Error::other("timeout");
    assert!(!is_fatal(&plain));
}

#[test]
fn test_wrapped_sources_are_all_reported() {
    let err = FatalProtocolError::with_cause(
        "cannot load transcript",
        ReadFailed {
            source: io::Error::other("disk gone"),
        },
    );

    let messages: Vec<String> = err.chain().map(|e| e.to_string()).collect();
    assert_eq!(messages, vec!["cannot load transcript", "read failed", "disk gone"]);

    let report = FatalReport::capture("transcript", &err);
    assert_eq!(report.causes(), ["read failed".to_string(), "disk gone".to_string()]);
}

#[test]
fn test_find_fatal_under_newtype_wrappers() {
    let wrapped = SessionAborted(FatalProtocolError::with_cause(
        "invariant broken",
        ReadFailed {
            source: io::Error::other("short read"),
        },
    ));

    let messages: Vec<String> = protocol_error::Chain::new(&wrapped)
        .map(|e| e.to_string())
        .collect();
    assert_eq!(
        messages,
        vec!["session aborted", "invariant broken", "read failed", "short read"]
    );
    assert_eq!(find_fatal(&wrapped).map(|e| e.depth()), Some(3));
}

#[test]
fn test_error_crosses_threads() {
    fn assert_send_sync<T: Send + Sync + 'static>() {}
    assert_send_sync::<FatalProtocolError>();

    let handle = thread::spawn(|| -> Result<(), FatalProtocolError> {
        Err(FatalProtocolError::with_cause("decryption round failed", chain_of(2)))
    });
    let err = handle.join().expect("thread panicked").unwrap_err();
    assert_eq!(err.depth(), 3);
}

proptest! {
    #[test]
    fn prop_new_keeps_message(message in ".*") {
        let err = FatalProtocolError::new(message.clone());
        prop_assert_eq!(err.message(), message.as_str());
        prop_assert!(err.cause().is_none());
    }

    #[test]
    fn prop_with_cause_keeps_both(message in ".*", inner in ".*") {
        let err = FatalProtocolError::with_cause(message.clone(), FatalProtocolError::new(inner.clone()));
        prop_assert_eq!(err.message(), message.as_str());
        let cause = err.cause().and_then(|c| c.downcast_ref::<FatalProtocolError>());
        prop_assert_eq!(cause.map(|c| c.message()), Some(inner.as_str()));
    }

    #[test]
    fn prop_chain_length_matches_nesting(depth in 1usize..32) {
        let err = chain_of(depth);
        prop_assert_eq!(err.depth(), depth);

        let messages: Vec<String> = err.chain().map(|e| e.to_string()).collect();
        let expected: Vec<String> = (0..depth).rev().map(|i| format!("layer {}", i)).collect();
        prop_assert_eq!(messages, expected);
        prop_assert_eq!(err.root_cause().to_string(), "layer 0");
    }
}
