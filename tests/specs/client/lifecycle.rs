//! Session lifecycle across threads

use ctlwire_adapters::{Connection, FakeConnector, TransportCall};
use ctlwire_client::{InvokeOutcome, Session, SessionError, SessionState, Timeout};
use ctlwire_core::Fault;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn slow_session(latency: Duration) -> (FakeConnector, Arc<Session>) {
    let fake = FakeConnector::new();
    fake.set_latency(latency);
    let connection = Connection::open(&fake, "unix:/run/ctl.sock").unwrap();
    let session = Session::cancelable(connection, "slow", 1).with_timeout(Timeout::Infinite);
    (fake, Arc::new(session))
}

fn wait_busy(session: &Session) {
    for _ in 0..500 {
        if session.state() == SessionState::Busy {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("session never became busy");
}

fn closes(fake: &FakeConnector) -> usize {
    fake.calls()
        .iter()
        .filter(|call| matches!(call, TransportCall::Close { .. }))
        .count()
}

#[test]
fn destroy_waits_for_in_flight_invoke() {
    let (fake, session) = slow_session(Duration::from_millis(100));

    let invoker = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.invoke())
    };
    wait_busy(&session);

    let destroyer = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.destroy())
    };
    destroyer.join().unwrap();
    assert_eq!(closes(&fake), 0, "transport closed before invoke returned");

    assert_eq!(
        invoker.join().unwrap().unwrap(),
        InvokeOutcome::Completed(0)
    );
    assert_eq!(closes(&fake), 1);
    assert!(matches!(session.invoke(), Err(SessionError::Destroyed)));
}

#[test]
fn cancel_from_another_thread_then_reuse() {
    let (fake, session) = slow_session(Duration::from_secs(60));

    let invoker = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.invoke())
    };
    wait_busy(&session);
    session.cancel().unwrap();

    assert_eq!(
        invoker.join().unwrap().unwrap(),
        InvokeOutcome::Fatal(Fault::Canceled)
    );
    // the canceled exchange left the stream unusable
    assert!(!fake.is_open(1));
    assert_eq!(
        session.invoke().unwrap(),
        InvokeOutcome::Fatal(Fault::Closed)
    );
}

#[test]
fn remote_fault_keeps_session_usable() {
    let fake = FakeConnector::new();
    fake.set_handler(|request| match request.service.as_str() {
        "busy" => ctlwire_core::Response::Fault {
            fault: Fault::TooManyClients,
        },
        _ => ctlwire_core::Response::reply(0, &[]),
    });
    let connection = Connection::open(&fake, "unix:/run/ctl.sock").unwrap();
    let session = Session::new(connection, "busy", 1);

    assert_eq!(
        session.invoke().unwrap(),
        InvokeOutcome::Fatal(Fault::TooManyClients)
    );
    assert_eq!(session.invoke().unwrap().code(), InvokeOutcome::FATAL_CODE);

    session.reset("fine", 1).unwrap();
    assert_eq!(session.invoke().unwrap(), InvokeOutcome::Completed(0));
}
