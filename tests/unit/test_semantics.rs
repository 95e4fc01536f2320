//! Item classification coverage.

use massilia::asm::AssemblyItem as Item;
use massilia::semantics;
use massilia::utils::opcodes::op;

#[test]
fn test_all_dup_swap_depths() {
    for n in 1usize..=16 {
        let dup = Item::Op(op::DUP1 + (n as u8 - 1));
        let swap = Item::Op(op::SWAP1 + (n as u8 - 1));
        assert_eq!(semantics::dup_depth(&dup), Some(n));
        assert_eq!(semantics::swap_depth(&swap), Some(n));
        assert!(!semantics::breaks_basic_block(&dup));
        assert!(!semantics::breaks_basic_block(&swap));
    }
}

#[test]
fn test_in_block_side_effects() {
    // These stay inside a block but appear in the ordered effect log.
    for byte in [op::LOG0, op::LOG4, op::MSTORE8, op::CALLDATACOPY, op::CALL, op::CREATE2] {
        assert!(!semantics::breaks_basic_block(&Item::Op(byte)), "0x{byte:02x}");
        assert!(semantics::has_side_effects(byte), "0x{byte:02x}");
    }
    // Pure reads are neither.
    for byte in [op::CALLER, op::CALLDATALOAD, op::SLOAD, op::MLOAD] {
        assert!(!semantics::has_side_effects(byte), "0x{byte:02x}");
    }
}

#[test]
fn test_order_sensitive_reads_break_blocks() {
    for byte in [op::GAS, op::PC, op::MSIZE] {
        assert!(semantics::breaks_basic_block(&Item::Op(byte)));
    }
}

#[test]
fn test_call_state_reads() {
    for byte in [op::BALANCE, op::SELFBALANCE, op::EXTCODEHASH, op::RETURNDATASIZE, op::TLOAD] {
        assert!(semantics::reads_call_state(byte), "0x{byte:02x}");
        assert!(!semantics::has_side_effects(byte), "0x{byte:02x}");
    }
}

#[test]
fn test_staticcall_leaves_storage_alone() {
    assert!(semantics::invalidates_memory(op::STATICCALL));
    assert!(!semantics::invalidates_storage(op::STATICCALL));
}

#[test]
fn test_linker_pushes_are_not_boundaries() {
    assert!(!semantics::breaks_basic_block(&Item::PushSub(0)));
    assert!(!semantics::breaks_basic_block(&Item::PushProgramSize));
    assert!(semantics::breaks_basic_block(&Item::Tag(0)));
}
