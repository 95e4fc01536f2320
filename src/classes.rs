//! Equivalence classes of symbolic expressions.
//!
//! Every value the analyzer encounters is assigned to a class; two
//! expressions land in the same class exactly when the optimizer can prove
//! them equal.  Classes reference their argument classes by id, not by
//! pointer, which makes hash-consing a plain map lookup and keeps the
//! expression DAG in one flat vector.
//!
//! Interning applies a small, closed rewrite set first: constant folding in
//! EVM semantics, identity and absorbing laws, double negation, and a
//! canonical argument order for commutative operations.  No further
//! saturation happens, so termination is immediate.

use crate::asm::AssemblyItem;
use crate::core::arithmetic as arith;
use crate::semantics;
use crate::utils::opcodes::{self, op};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of one equivalence class.  Never reused within a block.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// The operation at the root of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprOp {
    /// An assembly item: a push kind (leaf) or an instruction.
    Item(AssemblyItem),
    /// A value that was already on the stack when the block was entered,
    /// keyed by its (non-positive) height.
    InitialStack(i32),
}

impl fmt::Display for ExprOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprOp::Item(item) => write!(f, "{item}"),
            ExprOp::InitialStack(h) => write!(f, "initial@{h}"),
        }
    }
}

/// One canonical expression: operation, argument classes, and (for
/// storage/memory-dependent operations) the sequence number that pins it
/// between writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression {
    pub op: ExprOp,
    pub arguments: Vec<ClassId>,
    pub sequence_number: Option<u32>,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.op)?;
        for a in &self.arguments {
            write!(f, " {a}")?;
        }
        write!(f, ")")?;
        if let Some(seq) = self.sequence_number {
            write!(f, "@{seq}")?;
        }
        Ok(())
    }
}

/// The class universe: a flat vector of representatives plus the interning
/// map.  Grows monotonically within one block and is discarded with it.
#[derive(Debug, Default)]
pub struct ExpressionClasses {
    representatives: Vec<Expression>,
    classes: HashMap<Expression, ClassId>,
}

impl ExpressionClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of classes created so far.
    pub fn len(&self) -> usize {
        self.representatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
    }

    /// Return the class of the given expression, creating it if necessary.
    ///
    /// Pure expressions (no sequence number) are simplified first; when the
    /// rewrite produces a different expression, the returned id is that of
    /// the simplified form and the original spelling is mapped to it too, so
    /// a later lookup of either finds the same class.
    pub fn find(
        &mut self,
        op: ExprOp,
        arguments: Vec<ClassId>,
        sequence_number: Option<u32>,
    ) -> ClassId {
        let mut expr = Expression { op, arguments, sequence_number };
        if expr.sequence_number.is_none() {
            self.normalize(&mut expr);
            if let Some(id) = self.simplify(&expr) {
                self.classes.entry(expr).or_insert(id);
                return id;
            }
        }
        self.intern(expr)
    }

    /// Shorthand for interning a concrete constant.
    pub fn find_constant(&mut self, value: U256) -> ClassId {
        self.intern(Expression {
            op: ExprOp::Item(AssemblyItem::Push(value)),
            arguments: Vec::new(),
            sequence_number: None,
        })
    }

    /// The defining expression of a class.
    ///
    /// Panics if the id does not belong to this universe; ids are never
    /// handed out without a representative, so that is an internal bug.
    pub fn representative(&self, id: ClassId) -> &Expression {
        &self.representatives[id.0 as usize]
    }

    /// If the class is a folded constant, its 256-bit value.
    pub fn known_constant(&self, id: ClassId) -> Option<U256> {
        match &self.representative(id).op {
            ExprOp::Item(AssemblyItem::Push(v)) if self.representative(id).arguments.is_empty() => {
                Some(*v)
            }
            _ => None,
        }
    }

    // -- Interning ---------------------------------------------------------

    fn intern(&mut self, expr: Expression) -> ClassId {
        if let Some(&id) = self.classes.get(&expr) {
            return id;
        }
        let id = ClassId(self.representatives.len() as u32);
        self.representatives.push(expr.clone());
        self.classes.insert(expr, id);
        id
    }

    // -- Simplification ----------------------------------------------------

    /// Canonical argument order for commutative operations: ascending class
    /// id.  This is the whole mechanism by which `a+b` and `b+a` unify.
    fn normalize(&self, expr: &mut Expression) {
        if let ExprOp::Item(item) = &expr.op {
            if semantics::is_commutative_operation(item) {
                expr.arguments.sort();
            }
        }
    }

    /// Apply the rewrite set.  Returns the class of the simplified form, or
    /// `None` when the expression is already canonical.
    fn simplify(&mut self, expr: &Expression) -> Option<ClassId> {
        let byte = match &expr.op {
            ExprOp::Item(AssemblyItem::Op(b)) => *b,
            _ => return None,
        };
        let args = expr.arguments.as_slice();

        // Constant folding.
        if !args.is_empty() {
            let values: Option<Vec<U256>> =
                args.iter().map(|&a| self.known_constant(a)).collect();
            if let Some(values) = values {
                if let Some(name) = opcodes::opcode_name(byte) {
                    if let Some(result) = arith::eval_concrete(name, &values) {
                        return Some(self.find_constant(result));
                    }
                }
            }
        }

        // Identity and absorbing laws.  Commutative arguments are already
        // sorted, so a constant operand can sit on either side.
        match (byte, args) {
            (op::ADD | op::OR | op::XOR, &[a, b]) => {
                if self.is_known(a, U256::zero()) {
                    return Some(b);
                }
                if self.is_known(b, U256::zero()) {
                    return Some(a);
                }
            }
            (op::SUB, &[a, b]) => {
                if self.is_known(b, U256::zero()) {
                    return Some(a);
                }
            }
            (op::MUL, &[a, b]) => {
                if self.is_known(a, U256::one()) {
                    return Some(b);
                }
                if self.is_known(b, U256::one()) {
                    return Some(a);
                }
                if self.is_known(a, U256::zero()) || self.is_known(b, U256::zero()) {
                    return Some(self.find_constant(U256::zero()));
                }
            }
            (op::DIV, &[a, b]) => {
                if self.is_known(b, U256::one()) {
                    return Some(a);
                }
            }
            (op::AND, &[a, b]) => {
                if self.is_known(a, U256::MAX) {
                    return Some(b);
                }
                if self.is_known(b, U256::MAX) {
                    return Some(a);
                }
                if self.is_known(a, U256::zero()) || self.is_known(b, U256::zero()) {
                    return Some(self.find_constant(U256::zero()));
                }
            }
            (op::SHL | op::SHR | op::SAR, &[shift, value]) => {
                if self.is_known(shift, U256::zero()) {
                    return Some(value);
                }
            }
            (op::NOT, &[a]) => {
                let rep = self.representative(a);
                if matches!(rep.op, ExprOp::Item(AssemblyItem::Op(op::NOT))) {
                    return Some(rep.arguments[0]);
                }
            }
            _ => {}
        }
        None
    }

    fn is_known(&self, id: ClassId, value: U256) -> bool {
        self.known_constant(id) == Some(value)
    }
}

impl fmt::Display for ExpressionClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, expr) in self.representatives.iter().enumerate() {
            writeln!(f, "  {}: {expr}", ClassId(idx as u32))?;
        }
        Ok(())
    }
}
