//! Integration tests for the ring log

use cmdlog::{Entry, PendingBuffer, RingLog, DEFAULT_CAPACITY};

fn entry(bytes: &[u8]) -> Entry {
    PendingBuffer::new().complete(bytes).unwrap()
}

fn stream(ring: &RingLog) -> Vec<u8> {
    ring.iter().flat_map(|e| e.iter().copied()).collect()
}

#[test]
fn test_default_capacity_is_ten() {
    assert_eq!(RingLog::new(DEFAULT_CAPACITY).capacity(), 10);
}

#[test]
fn test_eviction_releases_exactly_the_oldest() {
    let mut ring = RingLog::new(DEFAULT_CAPACITY);
    for i in 0..DEFAULT_CAPACITY {
        assert!(ring.ingest(entry(format!("{i}\n").as_bytes())).is_none());
    }
    assert!(ring.is_full());
    let before = ring.total_len();

    let evicted = ring.ingest(entry(b"new\n")).unwrap();

    assert_eq!(evicted.as_bytes(), b"0\n");
    assert_eq!(ring.len(), DEFAULT_CAPACITY);
    assert_eq!(ring.total_len(), before - 2 + 4);
    assert!(ring.iter().all(|e| e.as_bytes() != b"0\n"));
}

#[test]
fn test_evicted_bytes_are_not_resolvable() {
    let mut ring = RingLog::new(2);
    ring.ingest(entry(b"gone\n"));
    ring.ingest(entry(b"kept\n"));
    ring.ingest(entry(b"last\n"));

    let resolved: Vec<u8> = (0..ring.total_len())
        .map(|offset| {
            let (e, within) = ring.resolve(offset).unwrap();
            e[within]
        })
        .collect();

    assert_eq!(resolved, b"kept\nlast\n");
    assert_eq!(resolved, stream(&ring));
    assert!(ring.resolve(ring.total_len()).is_none());
}

#[test]
fn test_resolve_offsets_at_entry_boundaries() {
    let mut ring = RingLog::new(4);
    ring.ingest(entry(b"ab\n"));
    ring.ingest(entry(b"c\n"));
    ring.ingest(entry(b"defg\n"));

    let expect = [
        (0, b"ab\n".as_slice(), 0),
        (2, b"ab\n".as_slice(), 2),
        (3, b"c\n".as_slice(), 0),
        (4, b"c\n".as_slice(), 1),
        (5, b"defg\n".as_slice(), 0),
        (9, b"defg\n".as_slice(), 4),
    ];
    for (offset, bytes, within) in expect {
        let (e, w) = ring.resolve(offset).unwrap();
        assert_eq!(e.as_bytes(), bytes, "offset {offset}");
        assert_eq!(w, within, "offset {offset}");
    }
    assert!(ring.resolve(10).is_none());
    assert!(ring.resolve(u64::MAX).is_none());
}

#[test]
fn test_many_wraps_keep_fifo_order() {
    let mut ring = RingLog::new(3);
    for i in 0..100 {
        ring.ingest(entry(format!("{i}\n").as_bytes()));
    }

    assert_eq!(stream(&ring), b"97\n98\n99\n");
}
