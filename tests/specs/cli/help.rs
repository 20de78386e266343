//! CLI help output specs

use crate::prelude::*;

#[test]
fn no_args_shows_usage_and_fails() {
    cli().fails().stderr_has("Usage:");
}

#[test]
fn help_lists_subcommands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("call")
        .stdout_has("schema");
}

#[test]
fn call_help_describes_arguments() {
    cli()
        .args(&["call", "--help"])
        .passes()
        .stdout_has("KIND:VALUE")
        .stdout_has("--timeout-ms");
}
