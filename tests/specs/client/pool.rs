//! Connection pool behavior seen from sessions

use ctlwire_adapters::FakeConnector;
use ctlwire_client::{ConnectionPool, InvokeOutcome, PoolError, Session};

#[test]
fn capacity_plus_one_evicts_oldest_unused() {
    let fake = FakeConnector::new();
    let pool = ConnectionPool::new(fake.clone(), 3);
    let addresses = ["a:1", "b:1", "c:1"];
    let first: Vec<_> = addresses.iter().map(|a| pool.open(a).unwrap()).collect();

    pool.open("d:1").unwrap();

    let survivors: Vec<_> = addresses
        .iter()
        .filter(|a| pool.cached(a).unwrap().is_some())
        .collect();
    assert_eq!(survivors, vec![&"b:1", &"c:1"]);
    assert_ne!(pool.open("a:1").unwrap(), first[0]);
    assert_eq!(pool.len(), 3);
}

#[test]
fn sessions_share_pooled_connection() {
    let fake = FakeConnector::new();
    let pool = ConnectionPool::new(fake.clone(), 2);

    let a = Session::new(pool.open("ctl:1").unwrap(), "a", 1);
    let b = Session::new(pool.open("ctl:1").unwrap(), "b", 1);
    assert_eq!(a.invoke().unwrap(), InvokeOutcome::Completed(0));
    assert_eq!(b.invoke().unwrap(), InvokeOutcome::Completed(0));
    assert_eq!(fake.opened(), 1);

    drop(a);
    drop(b);
    assert_eq!(pool.reap(true).unwrap(), 1);
    assert_eq!(fake.open_count(), 0);
}

#[test]
fn destroyed_pool_rejects_opens() {
    let pool = ConnectionPool::new(FakeConnector::new(), 2);
    let connection = pool.open("ctl:1").unwrap();
    pool.destroy();

    assert!(!connection.is_open());
    assert!(matches!(pool.open("ctl:1"), Err(PoolError::BadPool)));
}
