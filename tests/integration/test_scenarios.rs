//! End-to-end behavior of single blocks, mirroring the situations the
//! optimizer was built for.

use massilia::analyzer::CommonSubexpressionEliminator;
use massilia::asm::{parse_assembly, AssemblyItem as Item};
use massilia::optimizer::optimize_items;
use massilia::utils::opcodes::op;

fn optimize_block(items: &[Item]) -> Vec<Item> {
    let mut cse = CommonSubexpressionEliminator::new();
    let rest = cse.feed_items(items).unwrap();
    assert!(rest.is_empty());
    cse.optimized_items().unwrap()
}

fn block(text: &str) -> Vec<Item> {
    parse_assembly(text).unwrap()
}

#[test]
fn test_duplicate_subexpression_shares_one_computation() {
    let input = block(
        "calldatasize\npush 2\nadd\npush 2\ncalldatasize\nadd\n",
    );
    let out = optimize_items(&input);
    assert_eq!(
        out,
        block("push 0x2\ncalldatasize\nadd\ndup1\n")
    );
}

#[test]
fn test_constant_folding() {
    assert_eq!(optimize_items(&block("push 3\npush 5\nadd\n")), block("push 0x8"));
    assert_eq!(
        optimize_items(&block("push 2\npush 10\nexp\n")),
        block("push 0x64")
    );
}

#[test]
fn test_stored_value_reused_instead_of_sload() {
    let out = optimize_block(&block(
        "push 1\nsload\npush 9\npush 1\nsstore\npush 1\nsload\n",
    ));
    let sloads = out.iter().filter(|i| **i == Item::Op(op::SLOAD)).count();
    let sstores = out.iter().filter(|i| **i == Item::Op(op::SSTORE)).count();
    assert_eq!(sloads, 1);
    assert_eq!(sstores, 1);
}

#[test]
fn test_sload_across_unknown_store_is_reissued() {
    let out = optimize_block(&block(
        "push 1\nsload\ndup1\ncalldatasize\nsstore\npush 1\nsload\n",
    ));
    let sloads = out.iter().filter(|i| **i == Item::Op(op::SLOAD)).count();
    assert_eq!(sloads, 2);
}

#[test]
fn test_identity_law_removes_the_operation() {
    assert!(optimize_block(&block("push 0\nadd\n")).is_empty());
    assert!(optimize_block(&block("push 1\nmul\n")).is_empty());
    assert_eq!(optimize_items(&block("push 0\nadd\n")), vec![]);
}

#[test]
fn test_back_to_back_swaps_vanish() {
    assert!(optimize_block(&block("swap2\nswap2\n")).is_empty());
    assert!(optimize_block(&block("swap16\nswap16\n")).is_empty());
}

#[test]
fn test_store_ordering_with_interleaved_loads() {
    // load A; store to B; load B; store to A; every effect in input order.
    let input = block(
        "push 1\nsload\npush 7\npush 2\nsstore\npush 2\nsload\npush 1\nsstore\n",
    );
    let out = optimize_block(&input);
    let effect_order: Vec<u8> = out
        .iter()
        .filter_map(|i| match i {
            Item::Op(b) if *b == op::SSTORE || *b == op::SLOAD => Some(*b),
            _ => None,
        })
        .collect();
    // First load, then the two stores in original order; the second load
    // resolves to the stored constant and disappears.
    assert_eq!(effect_order, vec![op::SLOAD, op::SSTORE, op::SSTORE]);
}

#[test]
fn test_commutative_blocks_optimize_identically() {
    let a = optimize_block(&block("caller\ncallvalue\nadd\n"));
    let b = optimize_block(&block("caller\ncallvalue\nswap1\nadd\n"));
    assert_eq!(a, b);
}

#[test]
fn test_idempotence_on_stable_outputs() {
    for text in [
        "push 3\npush 5\nadd\n",
        "calldatasize\npush 2\nadd\npush 2\ncalldatasize\nadd\n",
        "push 1\nsload\n",
    ] {
        let once = optimize_items(&block(text));
        let twice = optimize_items(&once);
        assert_eq!(once, twice, "input: {text:?}");
    }
}

#[test]
fn test_determinism() {
    let input = block(
        "push 1\nsload\npush 9\npush 1\nsstore\npush 1\nsload\ncalldatasize\nadd\n",
    );
    let a = optimize_block(&input);
    let b = optimize_block(&input);
    assert_eq!(a, b);
}

#[test]
fn test_semantic_shape_of_memory_block() {
    // Two stores at non-overlapping constant offsets; both loads resolve.
    let out = optimize_block(&block(
        "push 11\npush 0\nmstore\npush 22\npush 32\nmstore\npush 0\nmload\npush 32\nmload\n",
    ));
    let mloads = out.iter().filter(|i| **i == Item::Op(op::MLOAD)).count();
    let mstores = out.iter().filter(|i| **i == Item::Op(op::MSTORE)).count();
    assert_eq!(mloads, 0);
    assert_eq!(mstores, 2);
}
