//! End-to-end record echo through a session

use ctlwire_adapters::{Connection, FakeConnector, TransportCall};
use ctlwire_client::{InvokeOutcome, Session, SessionError, SessionState};
use ctlwire_core::test_support::{sample_registry, session_id_record};
use ctlwire_core::{RecordInstance, TypedValue};
use std::net::Ipv4Addr;

#[test]
fn session_id_record_echoes_back() {
    let registry = sample_registry();
    let fake = FakeConnector::new();
    let connection = Connection::open(&fake, "unix:/run/ctl.sock").unwrap();
    let session = Session::new(connection, "session", 1).with_registry(registry.clone());

    let record = session_id_record(&registry, 42);
    session.append(record).unwrap();
    assert_eq!(session.invoke().unwrap(), InvokeOutcome::Completed(0));

    let echoed = session.response(0).unwrap().into_record().unwrap();
    assert_eq!(echoed.schema_name(), "session-id");
    assert_eq!(echoed.get("id").unwrap(), TypedValue::U32(42));
}

#[test]
fn nested_record_survives_round_trip() {
    let registry = sample_registry();
    let fake = FakeConnector::new();
    let connection = Connection::open(&fake, "unix:/run/ctl.sock").unwrap();
    let session = Session::new(connection, "route", 7).with_registry(registry.clone());

    let target = RecordInstance::named(&registry, "target").unwrap();
    target.nested("sid").unwrap().set_u32("id", 5).unwrap();
    let hop = target.nested_at("hops", 1).unwrap();
    hop.set_addr("addr", Ipv4Addr::new(10, 0, 0, 1).into()).unwrap();
    hop.set_u16("port", 8080).unwrap();
    hop.set_str("name", "edge").unwrap();

    session.append(target).unwrap();
    session.append("tail").unwrap();
    session.invoke().unwrap();

    assert_eq!(session.response_count().unwrap(), 2);
    let echoed = session.response(0).unwrap().into_record().unwrap();
    let hop = echoed.nested_at("hops", 1).unwrap();
    assert_eq!(echoed.nested("sid").unwrap().get_u32("id").unwrap(), 5);
    assert_eq!(hop.get_u16("port").unwrap(), 8080);
    assert_eq!(hop.get_str("name").unwrap(), "edge");
    assert_eq!(session.response(1).unwrap(), TypedValue::from("tail"));
}

#[test]
fn request_carries_service_and_arguments() {
    let fake = FakeConnector::new();
    let connection = Connection::open(&fake, "tcp:ctl:9000").unwrap();
    let session = Session::new(connection, "stats", 3);

    session.append(1u8).unwrap();
    session.append(-2i64).unwrap();
    session.invoke().unwrap();

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].service, "stats");
    assert_eq!(requests[0].service_id, 3);
    assert_eq!(requests[0].args.len(), 2);
    assert_eq!(
        fake.calls()[0],
        TransportCall::Open {
            address: "tcp:ctl:9000".to_string()
        }
    );
}

#[test]
fn reset_starts_a_new_request() {
    let fake = FakeConnector::new();
    let connection = Connection::open(&fake, "unix:/run/ctl.sock").unwrap();
    let session = Session::new(connection, "a", 1);

    session.append(1u32).unwrap();
    session.invoke().unwrap();
    session.reset("b", 2).unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert!(matches!(
        session.response_count(),
        Err(SessionError::BadState { .. })
    ));
    session.invoke().unwrap();
    assert_eq!(session.response_count().unwrap(), 0);
    assert_eq!(session.service(), ("b".to_string(), 2));
}
