//! Context-independent classification of assembly items.
//!
//! These predicates decide which items the analyzer may consume, which
//! operations commute, and which instructions invalidate the symbolic
//! storage / memory views.

use crate::asm::AssemblyItem;
use crate::utils::opcodes::{self, op};

/// True if the given item starts a new basic block.
///
/// Control-flow items and labels obviously qualify.  GAS, PC and MSIZE also
/// seal the block: their values assume one exact instruction sequence, which
/// reordering would change.  Unknown opcode bytes are treated as boundaries
/// rather than guessed at.
pub fn breaks_basic_block(item: &AssemblyItem) -> bool {
    match item {
        AssemblyItem::Tag(_) => true,
        AssemblyItem::Op(b) => match *b {
            op::JUMP | op::JUMPI | op::JUMPDEST => true,
            op::STOP | op::RETURN | op::REVERT | op::INVALID | op::SELFDESTRUCT => true,
            op::GAS | op::PC | op::MSIZE => true,
            b => opcodes::arity(b).is_none(),
        },
        _ => false,
    }
}

/// True if the item is a two-argument operation whose value does not depend
/// on the order of its arguments.
pub fn is_commutative_operation(item: &AssemblyItem) -> bool {
    matches!(
        item,
        AssemblyItem::Op(op::ADD)
            | AssemblyItem::Op(op::MUL)
            | AssemblyItem::Op(op::AND)
            | AssemblyItem::Op(op::OR)
            | AssemblyItem::Op(op::XOR)
            | AssemblyItem::Op(op::EQ)
    )
}

/// If the item is `DUPn`, return `n` (1..=16).
pub fn dup_depth(item: &AssemblyItem) -> Option<usize> {
    match item {
        AssemblyItem::Op(b) if (op::DUP1..=op::DUP16).contains(b) => {
            Some((*b - op::DUP1) as usize + 1)
        }
        _ => None,
    }
}

/// If the item is `SWAPn`, return `n` (1..=16).
pub fn swap_depth(item: &AssemblyItem) -> Option<usize> {
    match item {
        AssemblyItem::Op(b) if (op::SWAP1..=op::SWAP16).contains(b) => {
            Some((*b - op::SWAP1) as usize + 1)
        }
        _ => None,
    }
}

/// True if the item is any `DUPn` instruction.
pub fn is_dup_instruction(item: &AssemblyItem) -> bool {
    dup_depth(item).is_some()
}

/// True if the item is any `SWAPn` instruction.
pub fn is_swap_instruction(item: &AssemblyItem) -> bool {
    swap_depth(item).is_some()
}

/// True if executing the opcode can change memory contents.
pub fn invalidates_memory(byte: u8) -> bool {
    matches!(
        byte,
        op::MSTORE
            | op::MSTORE8
            | op::MCOPY
            | op::CALLDATACOPY
            | op::CODECOPY
            | op::EXTCODECOPY
            | op::RETURNDATACOPY
            | op::CALL
            | op::CALLCODE
            | op::DELEGATECALL
            | op::STATICCALL
            | op::CREATE
            | op::CREATE2
    )
}

/// True if executing the opcode can change storage contents.
pub fn invalidates_storage(byte: u8) -> bool {
    matches!(
        byte,
        op::SSTORE
            | op::CALL
            | op::CALLCODE
            | op::DELEGATECALL
            | op::CREATE
            | op::CREATE2
    )
}

/// True if the opcode has an observable effect beyond its stack result and
/// therefore must be re-emitted exactly once, in order.
pub fn has_side_effects(byte: u8) -> bool {
    invalidates_memory(byte)
        || invalidates_storage(byte)
        || matches!(byte, op::LOG0..=op::LOG4 | op::TSTORE)
}

/// True if the opcode reads state that calls (or transient stores) can
/// change, so its result may only be unified within one quiescent span.
pub fn reads_call_state(byte: u8) -> bool {
    matches!(
        byte,
        op::BALANCE
            | op::SELFBALANCE
            | op::EXTCODESIZE
            | op::EXTCODEHASH
            | op::RETURNDATASIZE
            | op::TLOAD
    )
}
