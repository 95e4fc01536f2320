//! Domain-specific error types.
//!
//! Uses `thiserror` for structured error definitions rather than relying
//! solely on `anyhow` for everything.

use crate::classes::ClassId;
use thiserror::Error;

/// Errors from the analyzer or the code generator.
///
/// All of these are fatal for the current basic block; the caller keeps the
/// original item sequence as fallback.
#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("invalid stack state: no expression for stack height {height}")]
    InvalidStackState { height: i32 },

    #[error("stack too deep: class {class} needed at depth {depth}")]
    StackTooDeep { class: ClassId, depth: usize },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(&'static str),

    #[error("item fed into a sealed block")]
    SealedBlock,
}

/// Errors from the assembly text parser.
#[derive(Debug, Error)]
pub enum AsmParseError {
    #[error("line {line}: unknown mnemonic `{text}`")]
    UnknownMnemonic { line: usize, text: String },

    #[error("line {line}: invalid operand `{text}`")]
    InvalidOperand { line: usize, text: String },

    #[error("line {line}: missing operand for `{text}`")]
    MissingOperand { line: usize, text: String },
}
