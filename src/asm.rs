//! Assembly items — the instruction stream the optimizer consumes and emits.
//!
//! An item is a tagged union: a plain EVM operation, a push of a concrete
//! value, or one of the linker-level pushes (tags, data references, subassembly
//! references) that behave like opaque pushes.  Dispatch is by `match`, never
//! by dynamic calls.

use crate::errors::AsmParseError;
use crate::utils::opcodes;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// -- Serde helpers for U256 --------------------------------------------------

mod u256_serde {
    use primitive_types::U256;
    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize a U256 as a hex string (e.g. `"0x1a2b"`).
    pub fn serialize<S: Serializer>(val: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{val:x}"))
    }

    /// Deserialize a U256 from a hex string (with or without `0x` prefix).
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let hex_str = String::deserialize(d)?;
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(&hex_str);
        U256::from_str_radix(hex_str, 16).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Core item type
// ---------------------------------------------------------------------------

/// One assembly item.
///
/// The linker-level push kinds (`PushTag`, `PushData`, `PushSub`,
/// `PushSubSize`, `PushProgramSize`) all leave one unknown-but-fixed word on
/// the stack; they carry distinct tags so they never unify with numeric
/// pushes or with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssemblyItem {
    /// A plain EVM instruction, by opcode byte.
    Op(u8),
    /// Push of a concrete 256-bit value.
    Push(#[serde(with = "u256_serde")] U256),
    /// Push of a jump-tag address.
    PushTag(usize),
    /// A jump-tag definition (label).  Always a basic-block boundary.
    Tag(usize),
    /// Push of a data-section reference (keyed by content hash).
    PushData(#[serde(with = "u256_serde")] U256),
    /// Push of a subassembly address.
    PushSub(usize),
    /// Push of a subassembly size.
    PushSubSize(usize),
    /// Push of the final program size.
    PushProgramSize,
}

impl AssemblyItem {
    /// Create a push item from a `u64`.
    pub fn push(v: u64) -> Self {
        AssemblyItem::Push(U256::from(v))
    }

    /// Create a push item from a `U256`.
    pub fn push_u256(v: U256) -> Self {
        AssemblyItem::Push(v)
    }

    /// Create a plain operation item.
    pub fn operation(byte: u8) -> Self {
        AssemblyItem::Op(byte)
    }

    /// Return the opcode byte if this is a plain operation.
    pub fn opcode(&self) -> Option<u8> {
        match self {
            AssemblyItem::Op(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the pushed value if this is a concrete push.
    pub fn push_value(&self) -> Option<U256> {
        match self {
            AssemblyItem::Push(v) => Some(*v),
            _ => None,
        }
    }

    /// True for every item kind that deposits one opaque or concrete word.
    pub fn is_push_kind(&self) -> bool {
        !matches!(self, AssemblyItem::Op(_) | AssemblyItem::Tag(_))
    }

    /// Net change in stack height caused by this item.
    pub fn deposit(&self) -> i32 {
        match self {
            AssemblyItem::Op(b) => opcodes::stack_diff(*b).unwrap_or(0) as i32,
            AssemblyItem::Tag(_) => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for AssemblyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyItem::Op(b) => match opcodes::opcode_name(*b) {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "unknown_0x{b:02x}"),
            },
            AssemblyItem::Push(v) => write!(f, "push 0x{v:x}"),
            AssemblyItem::PushTag(t) => write!(f, "pushtag {t}"),
            AssemblyItem::Tag(t) => write!(f, "tag {t}"),
            AssemblyItem::PushData(h) => write!(f, "pushdata 0x{h:x}"),
            AssemblyItem::PushSub(i) => write!(f, "pushsub {i}"),
            AssemblyItem::PushSubSize(i) => write!(f, "pushsubsize {i}"),
            AssemblyItem::PushProgramSize => write!(f, "pushprogramsize"),
        }
    }
}

// ---------------------------------------------------------------------------
// Text parsing
// ---------------------------------------------------------------------------

fn parse_u256(text: &str, line: usize) -> Result<U256, AsmParseError> {
    let result = if let Some(hex) = text.strip_prefix("0x") {
        U256::from_str_radix(hex, 16).ok()
    } else {
        U256::from_dec_str(text).ok()
    };
    result.ok_or_else(|| AsmParseError::InvalidOperand { line, text: text.to_string() })
}

fn parse_usize(text: &str, line: usize) -> Result<usize, AsmParseError> {
    text.parse()
        .map_err(|_| AsmParseError::InvalidOperand { line, text: text.to_string() })
}

/// Parse one assembly item from a single line, e.g. `push 0x20` or `sstore`.
fn parse_item(line_text: &str, line: usize) -> Result<AssemblyItem, AsmParseError> {
    let mut parts = line_text.split_whitespace();
    let mnemonic = parts.next().unwrap_or_default().to_ascii_lowercase();
    let operand = parts.next();

    fn need_operand<'a>(
        operand: Option<&'a str>,
        line: usize,
        mnemonic: &str,
    ) -> Result<&'a str, AsmParseError> {
        operand.ok_or_else(|| AsmParseError::MissingOperand {
            line,
            text: mnemonic.to_string(),
        })
    }

    match mnemonic.as_str() {
        "push" => Ok(AssemblyItem::Push(parse_u256(need_operand(operand, line, &mnemonic)?, line)?)),
        "pushtag" => Ok(AssemblyItem::PushTag(parse_usize(need_operand(operand, line, &mnemonic)?, line)?)),
        "tag" => Ok(AssemblyItem::Tag(parse_usize(need_operand(operand, line, &mnemonic)?, line)?)),
        "pushdata" => Ok(AssemblyItem::PushData(parse_u256(need_operand(operand, line, &mnemonic)?, line)?)),
        "pushsub" => Ok(AssemblyItem::PushSub(parse_usize(need_operand(operand, line, &mnemonic)?, line)?)),
        "pushsubsize" => {
            Ok(AssemblyItem::PushSubSize(parse_usize(need_operand(operand, line, &mnemonic)?, line)?))
        }
        "pushprogramsize" => Ok(AssemblyItem::PushProgramSize),
        name => match opcodes::opcode_byte(name) {
            Some(byte) if opcodes::immediate_size(byte) > 0 => {
                // `push1 0x03` style: the width is irrelevant at item level.
                Ok(AssemblyItem::Push(parse_u256(need_operand(operand, line, &mnemonic)?, line)?))
            }
            Some(byte) => Ok(AssemblyItem::Op(byte)),
            None => Err(AsmParseError::UnknownMnemonic {
                line,
                text: name.to_string(),
            }),
        },
    }
}

/// Parse a whole assembly listing: one item per line, `#` comments, blank
/// lines ignored.
pub fn parse_assembly(text: &str) -> Result<Vec<AssemblyItem>, AsmParseError> {
    let mut items = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_text = raw.split('#').next().unwrap_or_default().trim();
        if line_text.is_empty() {
            continue;
        }
        items.push(parse_item(line_text, idx + 1)?);
    }
    Ok(items)
}

impl FromStr for AssemblyItem {
    type Err = AsmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_item(s.trim(), 1)
    }
}
