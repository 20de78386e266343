//! `ctlwire call` specs against a socket controller

use crate::prelude::*;
use ctlwire_core::test_support::SAMPLE_SCHEMAS;
use ctlwire_core::{Fault, Response, TypedValue};
use std::time::Duration;

#[test]
fn echoes_typed_arguments() {
    let controller = Controller::echo();
    cli()
        .args(&[
            "call",
            controller.address(),
            "echo",
            "1",
            "u32:7",
            "i8:-3",
            "addr:10.0.0.1",
            "string:hello",
        ])
        .passes()
        .stdout_eq(
            "code: 0\n  [0] u32 7\n  [1] i8 -3\n  [2] addr 10.0.0.1\n  [3] string hello\n",
        );
}

#[test]
fn json_output_carries_code_and_values() {
    let controller = Controller::with_handler(|_| Response::reply(5, &[TypedValue::U16(9)]));
    let run = cli()
        .args(&["call", controller.address(), "svc", "2", "-o", "json"])
        .passes();
    let json: serde_json::Value = serde_json::from_str(&run.stdout()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "code": 5, "values": [{ "type": "u16", "value": 9 }] })
    );
}

#[test]
fn records_decode_with_schema_file() {
    let controller = Controller::with_handler(|_| {
        let registry = ctlwire_core::test_support::sample_registry();
        let record = ctlwire_core::test_support::session_id_record(&registry, 42);
        Response::reply(0, &[TypedValue::Record(record)])
    });
    let schemas = controller.file("schemas.toml", SAMPLE_SCHEMAS);

    cli()
        .args(&[
            "call",
            controller.address(),
            "session",
            "1",
            "--schema",
            &schemas.display().to_string(),
        ])
        .passes()
        .stdout_has("[0] record session-id { id: 42 }");
}

#[test]
fn unknown_record_schema_is_a_fault() {
    let controller = Controller::with_handler(|_| {
        let registry = ctlwire_core::test_support::sample_registry();
        let record = ctlwire_core::test_support::session_id_record(&registry, 1);
        Response::reply(0, &[TypedValue::Record(record)])
    });
    cli()
        .args(&["call", controller.address(), "session", "1"])
        .fails()
        .code(2)
        .stdout_eq("fault: protocol violation\n");
}

#[test]
fn remote_fault_exits_two() {
    let controller = Controller::with_handler(|_| Response::Fault {
        fault: Fault::UnknownService,
    });
    cli()
        .args(&["call", controller.address(), "nope", "1"])
        .fails()
        .code(2)
        .stdout_eq("fault: unknown service\n");
}

#[test]
fn slow_controller_times_out() {
    let controller = Controller::with_handler(|request| {
        std::thread::sleep(Duration::from_millis(300));
        Response::Reply {
            code: 0,
            values: request.args,
        }
    });
    cli()
        .args(&[
            "call",
            controller.address(),
            "slow",
            "1",
            "--timeout-ms",
            "30",
        ])
        .fails()
        .code(2)
        .stdout_eq("fault: timed out\n");
}

#[test]
fn missing_socket_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let address = format!("unix:{}", dir.path().join("absent.sock").display());
    cli()
        .args(&["call", &address, "echo", "1"])
        .fails()
        .code(1)
        .stderr_has("connection refused");
}

#[test]
fn malformed_argument_is_rejected_before_connecting() {
    cli()
        .args(&["call", "unix:/nonexistent/ctl.sock", "echo", "1", "u8:300"])
        .fails()
        .code(1)
        .stderr_has("out of range");
}
