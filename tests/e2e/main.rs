//! End-to-end CLI harness.

mod test_cli;
