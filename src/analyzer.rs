//! The analysis half of the common subexpression eliminator.
//!
//! Items of one basic block are fed in one at a time.  The analyzer keeps a
//! symbolic stack (height → equivalence class), a sequence number that
//! advances with every storage- or memory-mutating instruction, symbolic
//! views of storage and memory contents, and an ordered log of the side
//! effects that the code generator must replay.
//!
//! One instance covers exactly one basic block; all state is discarded with
//! it.

use crate::asm::AssemblyItem;
use crate::classes::{ClassId, ExprOp, ExpressionClasses};
use crate::codegen::CseCodeGenerator;
use crate::errors::OptimizerError;
use crate::semantics;
use crate::utils::opcodes::{self, op};
use primitive_types::U256;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

/// Which state a logged side effect touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTarget {
    Storage,
    Memory,
    /// A side effect without a modelled slot: calls, creates, logs,
    /// byte-granular or bulk memory writes.
    Opaque,
}

/// One logged side effect.  The log is ordered by append time, which is
/// also ascending sequence-number order.
#[derive(Debug, Clone)]
pub struct StoreOperation {
    pub target: StoreTarget,
    /// The slot class for storage/memory stores; absent for opaque effects.
    pub slot: Option<ClassId>,
    pub sequence_number: u32,
    /// The class of the effect expression itself (e.g. the SSTORE node).
    pub expression: ClassId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Accepting,
    Sealed,
}

/// Symbolic executor for one basic block.
pub struct CommonSubexpressionEliminator {
    /// Current stack height relative to block entry; may go negative.
    stack_height: i32,
    /// Current stack layout.  Entries above `stack_height` are stale.
    stack_elements: BTreeMap<i32, ClassId>,
    /// Advanced by every mutating instruction.
    sequence_number: u32,
    /// What we know storage/memory to contain right now.
    storage_content: HashMap<ClassId, ClassId>,
    memory_content: HashMap<ClassId, ClassId>,
    store_operations: Vec<StoreOperation>,
    expression_classes: ExpressionClasses,
    state: BlockState,
}

impl Default for CommonSubexpressionEliminator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommonSubexpressionEliminator {
    pub fn new() -> Self {
        Self {
            stack_height: 0,
            stack_elements: BTreeMap::new(),
            sequence_number: 1,
            storage_content: HashMap::new(),
            memory_content: HashMap::new(),
            store_operations: Vec::new(),
            expression_classes: ExpressionClasses::new(),
            state: BlockState::Accepting,
        }
    }

    // -- Feeding ------------------------------------------------------------

    /// Consume items until the first basic-block boundary or the end of the
    /// input.  Returns the unconsumed tail; the boundary item itself is left
    /// in it.
    pub fn feed_items<'a>(
        &mut self,
        items: &'a [AssemblyItem],
    ) -> Result<&'a [AssemblyItem], OptimizerError> {
        let mut idx = 0;
        while idx < items.len() && !semantics::breaks_basic_block(&items[idx]) {
            self.feed_item(&items[idx])?;
            idx += 1;
        }
        if idx < items.len() {
            self.seal();
        }
        Ok(&items[idx..])
    }

    /// Feed a single non-boundary item.
    pub fn feed_item(&mut self, item: &AssemblyItem) -> Result<(), OptimizerError> {
        if self.state == BlockState::Sealed {
            return Err(OptimizerError::SealedBlock);
        }
        if semantics::breaks_basic_block(item) {
            return Err(OptimizerError::InternalInvariant(
                "basic-block boundary fed into the analyzer",
            ));
        }
        match item {
            AssemblyItem::Op(byte) => self.feed_operation(*byte, item),
            _ => {
                // Some push kind: one new leaf on the stack.
                let id = self.expression_classes.find(ExprOp::Item(item.clone()), vec![], None);
                self.stack_height += 1;
                self.set_stack_element(self.stack_height, id);
                Ok(())
            }
        }
    }

    fn feed_operation(&mut self, byte: u8, item: &AssemblyItem) -> Result<(), OptimizerError> {
        if let Some(n) = semantics::dup_depth(item) {
            let class = self.stack_element(self.stack_height - (n as i32 - 1))?;
            self.stack_height += 1;
            self.set_stack_element(self.stack_height, class);
            return Ok(());
        }
        if let Some(n) = semantics::swap_depth(item) {
            return self.swap_stack_elements(self.stack_height, self.stack_height - n as i32);
        }
        if byte == op::POP {
            self.stack_height -= 1;
            return Ok(());
        }

        let (pops, pushes) = opcodes::arity(byte)
            .ok_or(OptimizerError::InternalInvariant("opcode missing from arity table"))?;
        let mut arguments = Vec::with_capacity(pops as usize);
        for i in 0..pops as i32 {
            arguments.push(self.stack_element(self.stack_height - i)?);
        }

        let result = match byte {
            op::SLOAD => Some(self.load_from_storage(arguments[0])),
            op::MLOAD => Some(self.load_from_memory(arguments[0])),
            op::SSTORE => {
                self.store_in_storage(arguments[0], arguments[1]);
                None
            }
            op::MSTORE => {
                self.store_in_memory(arguments[0], arguments[1]);
                None
            }
            // Treated as an ordered memory read; two hashes unify only
            // within one write-free span.
            op::SHA3 => Some(self.expression_classes.find(
                ExprOp::Item(item.clone()),
                arguments,
                Some(self.sequence_number),
            )),
            _ if semantics::has_side_effects(byte) => {
                if semantics::invalidates_memory(byte) {
                    self.memory_content.clear();
                }
                if semantics::invalidates_storage(byte) {
                    self.storage_content.clear();
                }
                self.sequence_number += 1;
                let id = self.expression_classes.find(
                    ExprOp::Item(item.clone()),
                    arguments,
                    Some(self.sequence_number),
                );
                self.store_operations.push(StoreOperation {
                    target: StoreTarget::Opaque,
                    slot: None,
                    sequence_number: self.sequence_number,
                    expression: id,
                });
                (pushes == 1).then_some(id)
            }
            _ if semantics::reads_call_state(byte) => Some(self.expression_classes.find(
                ExprOp::Item(item.clone()),
                arguments,
                Some(self.sequence_number),
            )),
            _ => Some(self.expression_classes.find(ExprOp::Item(item.clone()), arguments, None)),
        };

        let new_height = self.stack_height + pushes as i32 - pops as i32;
        if pushes == 1 {
            if let Some(id) = result {
                self.set_stack_element(new_height, id);
            }
        }
        self.stack_height = new_height;
        Ok(())
    }

    /// Seal the block: no more items will be accepted.
    pub fn seal(&mut self) {
        self.state = BlockState::Sealed;
    }

    // -- Stack bookkeeping ---------------------------------------------------

    fn set_stack_element(&mut self, height: i32, class: ClassId) {
        self.stack_elements.insert(height, class);
    }

    /// Swap the classes at the two heights.
    fn swap_stack_elements(&mut self, height_a: i32, height_b: i32) -> Result<(), OptimizerError> {
        let a = self.stack_element(height_a)?;
        let b = self.stack_element(height_b)?;
        self.stack_elements.insert(height_a, b);
        self.stack_elements.insert(height_b, a);
        Ok(())
    }

    /// Current class at the given height.  Heights at or below the block
    /// entry default lazily to initial-stack leaves.
    pub fn stack_element(&mut self, height: i32) -> Result<ClassId, OptimizerError> {
        if let Some(&class) = self.stack_elements.get(&height) {
            return Ok(class);
        }
        if height > 0 {
            return Err(OptimizerError::InvalidStackState { height });
        }
        let id = self.initial_stack_element(height);
        self.stack_elements.insert(height, id);
        Ok(id)
    }

    /// The class of the value that sat at the given (non-positive) height
    /// when the block was entered.
    fn initial_stack_element(&mut self, height: i32) -> ClassId {
        self.expression_classes.find(ExprOp::InitialStack(height), vec![], None)
    }

    // -- Storage and memory views --------------------------------------------

    fn load_from_storage(&mut self, slot: ClassId) -> ClassId {
        if let Some(&value) = self.storage_content.get(&slot) {
            return value;
        }
        let id = self.expression_classes.find(
            ExprOp::Item(AssemblyItem::Op(op::SLOAD)),
            vec![slot],
            Some(self.sequence_number),
        );
        self.storage_content.insert(slot, id);
        id
    }

    fn store_in_storage(&mut self, slot: ClassId, value: ClassId) {
        self.sequence_number += 1;
        if self.expression_classes.known_constant(slot).is_some() {
            // Distinct constants cannot alias; everything symbolic might.
            let classes = &self.expression_classes;
            self.storage_content.retain(|&s, _| classes.known_constant(s).is_some());
        } else {
            self.storage_content.clear();
        }
        self.storage_content.insert(slot, value);
        let id = self.expression_classes.find(
            ExprOp::Item(AssemblyItem::Op(op::SSTORE)),
            vec![slot, value],
            Some(self.sequence_number),
        );
        self.store_operations.push(StoreOperation {
            target: StoreTarget::Storage,
            slot: Some(slot),
            sequence_number: self.sequence_number,
            expression: id,
        });
    }

    fn load_from_memory(&mut self, offset: ClassId) -> ClassId {
        if let Some(&value) = self.memory_content.get(&offset) {
            return value;
        }
        let id = self.expression_classes.find(
            ExprOp::Item(AssemblyItem::Op(op::MLOAD)),
            vec![offset],
            Some(self.sequence_number),
        );
        self.memory_content.insert(offset, id);
        id
    }

    fn store_in_memory(&mut self, offset: ClassId, value: ClassId) {
        self.sequence_number += 1;
        if let Some(written) = self.expression_classes.known_constant(offset) {
            // A 32-byte store only clobbers entries within 31 bytes either
            // side; constant offsets further apart survive.
            let classes = &self.expression_classes;
            self.memory_content.retain(|&s, _| match classes.known_constant(s) {
                Some(other) => words_do_not_overlap(written, other),
                None => false,
            });
        } else {
            self.memory_content.clear();
        }
        self.memory_content.insert(offset, value);
        let id = self.expression_classes.find(
            ExprOp::Item(AssemblyItem::Op(op::MSTORE)),
            vec![offset, value],
            Some(self.sequence_number),
        );
        self.store_operations.push(StoreOperation {
            target: StoreTarget::Memory,
            slot: Some(offset),
            sequence_number: self.sequence_number,
            expression: id,
        });
    }

    // -- Results --------------------------------------------------------------

    /// Lowest stack height this block has touched (or the height just above
    /// the final one, whichever is lower).
    pub fn min_height(&self) -> i32 {
        let lowest_touched = self
            .stack_elements
            .keys()
            .next()
            .copied()
            .unwrap_or(self.stack_height + 1);
        lowest_touched.min(self.stack_height + 1)
    }

    /// Classes on the real stack at block entry, by height.
    pub fn initial_stack(&mut self) -> BTreeMap<i32, ClassId> {
        let mut map = BTreeMap::new();
        for height in self.min_height()..=0 {
            map.insert(height, self.initial_stack_element(height));
        }
        map
    }

    /// Classes required on the stack after the optimized block, by height.
    pub fn target_stack(&mut self) -> Result<BTreeMap<i32, ClassId>, OptimizerError> {
        let mut map = BTreeMap::new();
        for height in self.min_height()..=self.stack_height {
            map.insert(height, self.stack_element(height)?);
        }
        Ok(map)
    }

    pub fn stack_height(&self) -> i32 {
        self.stack_height
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    pub fn store_operations(&self) -> &[StoreOperation] {
        &self.store_operations
    }

    pub fn expression_classes(&self) -> &ExpressionClasses {
        &self.expression_classes
    }

    pub fn expression_classes_mut(&mut self) -> &mut ExpressionClasses {
        &mut self.expression_classes
    }

    /// Seal the block and generate the optimized item sequence.
    pub fn optimized_items(&mut self) -> Result<Vec<AssemblyItem>, OptimizerError> {
        self.seal();
        let initial = self.initial_stack();
        let target = self.target_stack()?;
        log::debug!(
            "generating code for block: {} classes, {} store ops, target height {}",
            self.expression_classes.len(),
            self.store_operations.len(),
            self.stack_height
        );
        let operations = self.store_operations.clone();
        CseCodeGenerator::new(&mut self.expression_classes, operations)
            .generate_code(&initial, &target)
    }

    /// Print the analyzer state in a stable human-readable form.  The format
    /// is for debugging only and not part of the contract.
    pub fn stream<W: Write>(
        &self,
        out: &mut W,
        initial_stack: &BTreeMap<i32, ClassId>,
        target_stack: &BTreeMap<i32, ClassId>,
    ) -> io::Result<()> {
        writeln!(out, "Expression classes:")?;
        write!(out, "{}", self.expression_classes)?;
        writeln!(out, "Stack height: {}", self.stack_height)?;
        writeln!(out, "Stack elements:")?;
        for (height, class) in &self.stack_elements {
            writeln!(out, "  {height}: {class}")?;
        }
        writeln!(out, "Store operations:")?;
        for operation in &self.store_operations {
            match operation.slot {
                Some(slot) => writeln!(
                    out,
                    "  {:?} slot {} seq {} expr {}",
                    operation.target, slot, operation.sequence_number, operation.expression
                )?,
                None => writeln!(
                    out,
                    "  {:?} seq {} expr {}",
                    operation.target, operation.sequence_number, operation.expression
                )?,
            }
        }
        writeln!(out, "Initial stack:")?;
        for (height, class) in initial_stack {
            writeln!(out, "  {height}: {class}")?;
        }
        writeln!(out, "Target stack:")?;
        for (height, class) in target_stack {
            writeln!(out, "  {height}: {class}")?;
        }
        Ok(())
    }
}

/// Two 32-byte words at constant offsets leave each other intact iff they
/// are at least a word apart.
fn words_do_not_overlap(a: U256, b: U256) -> bool {
    let distance = if a > b { a - b } else { b - a };
    distance >= U256::from(32u64)
}
