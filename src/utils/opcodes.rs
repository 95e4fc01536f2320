//! EVM opcode definitions covering every hard-fork from Frontier through Cancun.
//!
//! Each opcode carries its byte value, mnemonic, the stack items it pops / pushes,
//! and the number of immediate bytes (for `PUSHn`).

use std::collections::HashMap;

/// Well-known opcode byte values the optimizer dispatches on.
pub mod op {
    pub const STOP: u8 = 0x00;
    pub const ADD: u8 = 0x01;
    pub const MUL: u8 = 0x02;
    pub const SUB: u8 = 0x03;
    pub const DIV: u8 = 0x04;
    pub const SDIV: u8 = 0x05;
    pub const MOD: u8 = 0x06;
    pub const SMOD: u8 = 0x07;
    pub const ADDMOD: u8 = 0x08;
    pub const MULMOD: u8 = 0x09;
    pub const EXP: u8 = 0x0A;
    pub const SIGNEXTEND: u8 = 0x0B;
    pub const LT: u8 = 0x10;
    pub const GT: u8 = 0x11;
    pub const SLT: u8 = 0x12;
    pub const SGT: u8 = 0x13;
    pub const EQ: u8 = 0x14;
    pub const ISZERO: u8 = 0x15;
    pub const AND: u8 = 0x16;
    pub const OR: u8 = 0x17;
    pub const XOR: u8 = 0x18;
    pub const NOT: u8 = 0x19;
    pub const BYTE: u8 = 0x1A;
    pub const SHL: u8 = 0x1B;
    pub const SHR: u8 = 0x1C;
    pub const SAR: u8 = 0x1D;
    pub const SHA3: u8 = 0x20;
    pub const ADDRESS: u8 = 0x30;
    pub const BALANCE: u8 = 0x31;
    pub const ORIGIN: u8 = 0x32;
    pub const CALLER: u8 = 0x33;
    pub const CALLVALUE: u8 = 0x34;
    pub const CALLDATALOAD: u8 = 0x35;
    pub const CALLDATASIZE: u8 = 0x36;
    pub const CALLDATACOPY: u8 = 0x37;
    pub const CODESIZE: u8 = 0x38;
    pub const CODECOPY: u8 = 0x39;
    pub const GASPRICE: u8 = 0x3A;
    pub const EXTCODESIZE: u8 = 0x3B;
    pub const EXTCODECOPY: u8 = 0x3C;
    pub const RETURNDATASIZE: u8 = 0x3D;
    pub const RETURNDATACOPY: u8 = 0x3E;
    pub const EXTCODEHASH: u8 = 0x3F;
    pub const BLOCKHASH: u8 = 0x40;
    pub const COINBASE: u8 = 0x41;
    pub const TIMESTAMP: u8 = 0x42;
    pub const NUMBER: u8 = 0x43;
    pub const DIFFICULTY: u8 = 0x44;
    pub const GASLIMIT: u8 = 0x45;
    pub const CHAINID: u8 = 0x46;
    pub const SELFBALANCE: u8 = 0x47;
    pub const BASEFEE: u8 = 0x48;
    pub const BLOBHASH: u8 = 0x49;
    pub const BLOBBASEFEE: u8 = 0x4A;
    pub const POP: u8 = 0x50;
    pub const MLOAD: u8 = 0x51;
    pub const MSTORE: u8 = 0x52;
    pub const MSTORE8: u8 = 0x53;
    pub const SLOAD: u8 = 0x54;
    pub const SSTORE: u8 = 0x55;
    pub const JUMP: u8 = 0x56;
    pub const JUMPI: u8 = 0x57;
    pub const PC: u8 = 0x58;
    pub const MSIZE: u8 = 0x59;
    pub const GAS: u8 = 0x5A;
    pub const JUMPDEST: u8 = 0x5B;
    pub const TLOAD: u8 = 0x5C;
    pub const TSTORE: u8 = 0x5D;
    pub const MCOPY: u8 = 0x5E;
    pub const PUSH0: u8 = 0x5F;
    pub const PUSH1: u8 = 0x60;
    pub const PUSH32: u8 = 0x7F;
    pub const DUP1: u8 = 0x80;
    pub const DUP2: u8 = 0x81;
    pub const DUP3: u8 = 0x82;
    pub const DUP16: u8 = 0x8F;
    pub const SWAP1: u8 = 0x90;
    pub const SWAP2: u8 = 0x91;
    pub const SWAP3: u8 = 0x92;
    pub const SWAP16: u8 = 0x9F;
    pub const LOG0: u8 = 0xA0;
    pub const LOG1: u8 = 0xA1;
    pub const LOG4: u8 = 0xA4;
    pub const CREATE: u8 = 0xF0;
    pub const CALL: u8 = 0xF1;
    pub const CALLCODE: u8 = 0xF2;
    pub const RETURN: u8 = 0xF3;
    pub const DELEGATECALL: u8 = 0xF4;
    pub const CREATE2: u8 = 0xF5;
    pub const STATICCALL: u8 = 0xFA;
    pub const REVERT: u8 = 0xFD;
    pub const INVALID: u8 = 0xFE;
    pub const SELFDESTRUCT: u8 = 0xFF;
}

/// Information about a single opcode.
#[derive(Debug, Clone)]
pub struct OpcodeInfo {
    pub byte: u8,
    pub name: &'static str,
    /// Number of stack items consumed.
    pub pops: u8,
    /// Number of stack items produced.
    pub pushes: u8,
    /// If this is a `PUSHn`, the number of immediate bytes.
    pub immediate_bytes: u8,
}

impl OpcodeInfo {
    /// Stack diff = pushes − pops  (may be negative).
    pub fn stack_diff(&self) -> i16 {
        self.pushes as i16 - self.pops as i16
    }
}

/// Build the full opcode table (byte → info).
pub fn build_opcode_table() -> HashMap<u8, OpcodeInfo> {
    let mut m: HashMap<u8, OpcodeInfo> = HashMap::new();

    macro_rules! op {
        ($byte:expr, $name:expr, $pops:expr, $pushes:expr) => {
            m.insert($byte, OpcodeInfo {
                byte: $byte,
                name: $name,
                pops: $pops,
                pushes: $pushes,
                immediate_bytes: 0,
            });
        };
    }

    // -- Stop and Arithmetic -----------------------------------------------
    op!(0x00, "stop",         0, 0);
    op!(0x01, "add",          2, 1);
    op!(0x02, "mul",          2, 1);
    op!(0x03, "sub",          2, 1);
    op!(0x04, "div",          2, 1);
    op!(0x05, "sdiv",         2, 1);
    op!(0x06, "mod",          2, 1);
    op!(0x07, "smod",         2, 1);
    op!(0x08, "addmod",       3, 1);
    op!(0x09, "mulmod",       3, 1);
    op!(0x0A, "exp",          2, 1);
    op!(0x0B, "signextend",   2, 1);

    // -- Comparison and Bitwise Logic --------------------------------------
    op!(0x10, "lt",           2, 1);
    op!(0x11, "gt",           2, 1);
    op!(0x12, "slt",          2, 1);
    op!(0x13, "sgt",          2, 1);
    op!(0x14, "eq",           2, 1);
    op!(0x15, "iszero",       1, 1);
    op!(0x16, "and",          2, 1);
    op!(0x17, "or",           2, 1);
    op!(0x18, "xor",          2, 1);
    op!(0x19, "not",          1, 1);
    op!(0x1A, "byte",         2, 1);
    op!(0x1B, "shl",          2, 1);
    op!(0x1C, "shr",          2, 1);
    op!(0x1D, "sar",          2, 1);

    // -- SHA3 --------------------------------------------------------------
    op!(0x20, "sha3",         2, 1);

    // -- Environment Information -------------------------------------------
    op!(0x30, "address",      0, 1);
    op!(0x31, "balance",      1, 1);
    op!(0x32, "origin",       0, 1);
    op!(0x33, "caller",       0, 1);
    op!(0x34, "callvalue",    0, 1);
    op!(0x35, "calldataload", 1, 1);
    op!(0x36, "calldatasize", 0, 1);
    op!(0x37, "calldatacopy", 3, 0);
    op!(0x38, "codesize",     0, 1);
    op!(0x39, "codecopy",     3, 0);
    op!(0x3A, "gasprice",     0, 1);
    op!(0x3B, "extcodesize",  1, 1);
    op!(0x3C, "extcodecopy",  4, 0);
    op!(0x3D, "returndatasize", 0, 1);
    op!(0x3E, "returndatacopy", 3, 0);
    op!(0x3F, "extcodehash",  1, 1);

    // -- Block Information -------------------------------------------------
    op!(0x40, "blockhash",    1, 1);
    op!(0x41, "coinbase",     0, 1);
    op!(0x42, "timestamp",    0, 1);
    op!(0x43, "number",       0, 1);
    op!(0x44, "difficulty",   0, 1);  // prevrandao post-Paris
    op!(0x45, "gaslimit",     0, 1);
    op!(0x46, "chainid",      0, 1);
    op!(0x47, "selfbalance",  0, 1);
    op!(0x48, "basefee",      0, 1);
    op!(0x49, "blobhash",     1, 1);
    op!(0x4A, "blobbasefee",  0, 1);

    // -- Stack, Memory, Storage and Flow -----------------------------------
    op!(0x50, "pop",          1, 0);
    op!(0x51, "mload",        1, 1);
    op!(0x52, "mstore",       2, 0);
    op!(0x53, "mstore8",      2, 0);
    op!(0x54, "sload",        1, 1);
    op!(0x55, "sstore",       2, 0);
    op!(0x56, "jump",         1, 0);
    op!(0x57, "jumpi",        2, 0);
    op!(0x58, "pc",           0, 1);
    op!(0x59, "msize",        0, 1);
    op!(0x5A, "gas",          0, 1);
    op!(0x5B, "jumpdest",     0, 0);
    op!(0x5C, "tload",        1, 1);
    op!(0x5D, "tstore",       2, 0);
    op!(0x5E, "mcopy",        3, 0);

    // -- PUSH0 (Shanghai) --------------------------------------------------
    op!(0x5F, "push0",        0, 1);

    // -- PUSH1..PUSH32 -----------------------------------------------------
    for n in 1u8..=32 {
        let byte = 0x5F + n;
        // We use a leaked string to get a &'static str for the name.
        // This is fine — the table is built once.
        let name: &'static str = Box::leak(format!("push{n}").into_boxed_str());
        m.insert(byte, OpcodeInfo {
            byte,
            name,
            pops: 0,
            pushes: 1,
            immediate_bytes: n,
        });
    }

    // -- DUP1..DUP16 -------------------------------------------------------
    for n in 1u8..=16 {
        let byte = 0x7F + n;
        let name: &'static str = Box::leak(format!("dup{n}").into_boxed_str());
        m.insert(byte, OpcodeInfo {
            byte,
            name,
            pops: n,
            pushes: n + 1,
            immediate_bytes: 0,
        });
    }

    // -- SWAP1..SWAP16 -----------------------------------------------------
    for n in 1u8..=16 {
        let byte = 0x8F + n;
        let name: &'static str = Box::leak(format!("swap{n}").into_boxed_str());
        m.insert(byte, OpcodeInfo {
            byte,
            name,
            pops: n + 1,
            pushes: n + 1,
            immediate_bytes: 0,
        });
    }

    // -- LOG0..LOG4 ---------------------------------------------------------
    for n in 0u8..=4 {
        let byte = 0xA0 + n;
        let name: &'static str = Box::leak(format!("log{n}").into_boxed_str());
        m.insert(byte, OpcodeInfo {
            byte,
            name,
            pops: n + 2,
            pushes: 0,
            immediate_bytes: 0,
        });
    }

    // -- System operations -------------------------------------------------
    op!(0xF0, "create",       3, 1);
    op!(0xF1, "call",         7, 1);
    op!(0xF2, "callcode",     7, 1);
    op!(0xF3, "return",       2, 0);
    op!(0xF4, "delegatecall", 6, 1);
    op!(0xF5, "create2",      4, 1);
    op!(0xFA, "staticcall",   6, 1);
    op!(0xFD, "revert",       2, 0);
    op!(0xFE, "invalid",      0, 0);
    op!(0xFF, "selfdestruct", 1, 0);

    m
}

thread_local! {
    static TABLE: HashMap<u8, OpcodeInfo> = build_opcode_table();
}

/// Lookup opcode name by byte value.
pub fn opcode_name(byte: u8) -> Option<&'static str> {
    TABLE.with(|t| t.get(&byte).map(|info| info.name))
}

/// Lookup opcode byte by mnemonic.
pub fn opcode_byte(name: &str) -> Option<u8> {
    TABLE.with(|t| {
        t.values()
            .find(|info| info.name == name)
            .map(|info| info.byte)
    })
}

/// Stack arity (pops, pushes) of an opcode, if it exists.
pub fn arity(byte: u8) -> Option<(u8, u8)> {
    TABLE.with(|t| t.get(&byte).map(|info| (info.pops, info.pushes)))
}

/// Stack diff (pushes − pops) of an opcode, if it exists.
pub fn stack_diff(byte: u8) -> Option<i16> {
    TABLE.with(|t| t.get(&byte).map(|info| info.stack_diff()))
}

/// Get the number of immediate bytes for a given opcode byte.
pub fn immediate_size(byte: u8) -> u8 {
    TABLE.with(|t| t.get(&byte).map(|info| info.immediate_bytes).unwrap_or(0))
}
