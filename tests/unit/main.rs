//! Unit test harness.

mod test_asm;
mod test_classes;
mod test_semantics;
