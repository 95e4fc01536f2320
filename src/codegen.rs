//! The code-generation half of the common subexpression eliminator.
//!
//! Given the sealed class universe, the ordered side-effect log, and the
//! initial and target stack layouts, this emits an item sequence that
//! replays every logged effect in order, computes every class the target
//! needs at most once, and then shuffles the stack into the target layout
//! with DUPs, SWAPs and POPs.
//!
//! Positions are tracked per class as the set of all live stack heights
//! holding a copy; a sentinel records classes that were generated but left
//! no value (stores) or whose copies were all consumed.  Classes out of
//! DUP16 reach are recomputed from their definition instead of duplicated.

use crate::analyzer::StoreOperation;
use crate::asm::AssemblyItem;
use crate::classes::{ClassId, ExprOp, ExpressionClasses};
use crate::errors::OptimizerError;
use crate::semantics;
use crate::utils::opcodes::{self, op};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Marks a class as generated without a live stack copy.
const INVALID_POSITION: i32 = i32::MIN;

/// Generates code for one basic block.  `generate_code` may be invoked at
/// most once per instance.
pub struct CseCodeGenerator<'a> {
    classes: &'a mut ExpressionClasses,
    /// The analyzer's side-effect log, in append (= ascending sequence) order.
    store_operations: Vec<StoreOperation>,

    generated_items: Vec<AssemblyItem>,
    /// Current height of the stack relative to block entry.
    stack_height: i32,
    /// Current stack contents.
    stack: BTreeMap<i32, ClassId>,
    /// All live positions of each class; `INVALID_POSITION` when generated
    /// but valueless or fully consumed.
    class_positions: HashMap<ClassId, BTreeSet<i32>>,
    /// `needed_by[b]` holds the classes that require `b` as an argument.
    needed_by: BTreeMap<ClassId, BTreeSet<ClassId>>,
    /// Every class reachable from the target stack or the side-effect log.
    seen: BTreeSet<ClassId>,
    /// Classes that must be present on the stack at the end.
    final_classes: BTreeSet<ClassId>,
    target_stack: BTreeMap<i32, ClassId>,
    target_height: i32,
    used: bool,
}

impl<'a> CseCodeGenerator<'a> {
    /// The store operations must be ordered ascendingly by sequence number,
    /// which the analyzer's log already is.
    pub fn new(classes: &'a mut ExpressionClasses, store_operations: Vec<StoreOperation>) -> Self {
        Self {
            classes,
            store_operations,
            generated_items: Vec::new(),
            stack_height: 0,
            stack: BTreeMap::new(),
            class_positions: HashMap::new(),
            needed_by: BTreeMap::new(),
            seen: BTreeSet::new(),
            final_classes: BTreeSet::new(),
            target_stack: BTreeMap::new(),
            target_height: 0,
            used: false,
        }
    }

    /// Emit items that transform a stack matching `initial_stack` into one
    /// matching `target_stack`, replaying all logged side effects in order.
    pub fn generate_code(
        &mut self,
        initial_stack: &BTreeMap<i32, ClassId>,
        target_stack: &BTreeMap<i32, ClassId>,
    ) -> Result<Vec<AssemblyItem>, OptimizerError> {
        if self.used {
            return Err(OptimizerError::InternalInvariant(
                "generate_code invoked twice on one generator",
            ));
        }
        self.used = true;

        self.stack = initial_stack.clone();
        self.target_stack = target_stack.clone();
        self.target_height = match target_stack.keys().next_back() {
            Some(&h) => h,
            // An empty target over a non-empty initial stack means every
            // inherited element gets popped.
            None => initial_stack.keys().next().map_or(0, |&h| h - 1),
        };
        for (&height, &class) in &self.stack {
            self.class_positions.entry(class).or_default().insert(height);
        }

        // Dependency graph, rooted at the target contents and the log.
        self.final_classes = target_stack.values().copied().collect();
        for class in self.final_classes.clone() {
            self.add_dependencies(class);
        }
        for operation in self.store_operations.clone() {
            self.add_dependencies(operation.expression);
        }

        // Sequenced reads (loads, hashes, call-state probes) that anything
        // requires, ordered by sequence number.  Each must run after the
        // writes it saw and before the next write to the same state, so they
        // are interleaved with the log below.
        let log_expressions: BTreeSet<ClassId> =
            self.store_operations.iter().map(|operation| operation.expression).collect();
        let mut pending_reads: Vec<(u32, ClassId)> = self
            .seen
            .iter()
            .copied()
            .filter(|class| !log_expressions.contains(class))
            .filter_map(|class| {
                self.classes.representative(class).sequence_number.map(|seq| (seq, class))
            })
            .collect();
        pending_reads.sort();
        let mut reads = pending_reads.into_iter().peekable();

        for operation in self.store_operations.clone() {
            while let Some(&(seq, class)) = reads.peek() {
                if seq >= operation.sequence_number {
                    break;
                }
                self.generate_class_element(class, true)?;
                reads.next();
            }
            self.generate_class_element(operation.expression, true)?;
        }
        for (_, class) in reads {
            self.generate_class_element(class, true)?;
        }

        // Make sure every target class exists on the stack.
        for &class in target_stack.values() {
            self.generate_class_element(class, true)?;
        }

        // Shuffle into the target layout, bottom-up.
        for (&height, &class) in target_stack {
            if self.stack.get(&height) == Some(&class) {
                continue;
            }
            self.copy_to_top(class)?;
            self.append_or_remove_swap(height)?;
            self.remove_stack_top_if_possible();
        }
        while self.stack_height > self.target_height {
            if !self.remove_stack_top_if_possible() {
                return Err(OptimizerError::InternalInvariant(
                    "surplus stack element cannot be removed",
                ));
            }
        }
        for (&height, &class) in target_stack {
            if self.stack.get(&height) != Some(&class) {
                return Err(OptimizerError::InternalInvariant(
                    "generated stack does not match the target layout",
                ));
            }
        }

        Ok(std::mem::take(&mut self.generated_items))
    }

    // -- Dependency discovery ------------------------------------------------

    /// Work-list walk over the expression DAG; recursion is deliberately
    /// avoided so pathological blocks cannot exhaust the call stack.
    fn add_dependencies(&mut self, root: ClassId) {
        let mut work = vec![root];
        while let Some(class) = work.pop() {
            if !self.seen.insert(class) {
                continue;
            }
            let arguments = self.classes.representative(class).arguments.clone();
            for argument in arguments {
                self.needed_by.entry(argument).or_default().insert(class);
                work.push(argument);
            }
        }
    }

    // -- Class materialization -----------------------------------------------

    /// Produce code that generates the given class if it is not yet present.
    /// Returns its stack position, or `INVALID_POSITION` for classes that
    /// leave no value (stores).
    fn generate_class_element(
        &mut self,
        class: ClassId,
        allow_sequenced: bool,
    ) -> Result<i32, OptimizerError> {
        while self.remove_stack_top_if_possible() {}

        if let Some(positions) = self.class_positions.get(&class) {
            return match positions.iter().next_back() {
                Some(&p) if p != INVALID_POSITION => Ok(p),
                _ => Err(OptimizerError::InternalInvariant(
                    "class already removed but still needed",
                )),
            };
        }

        let expr = self.classes.representative(class).clone();
        if !allow_sequenced && expr.sequence_number.is_some() {
            return Err(OptimizerError::InternalInvariant(
                "sequence-constrained class requested out of sequence",
            ));
        }
        let item = match &expr.op {
            ExprOp::Item(item) => item.clone(),
            ExprOp::InitialStack(_) => {
                return Err(OptimizerError::InternalInvariant(
                    "initial stack element requested but not available",
                ))
            }
        };
        let arguments = expr.arguments.clone();
        for &argument in arguments.iter().rev() {
            self.generate_class_element(argument, false)?;
        }

        // The arguments exist somewhere on the stack; copy or shuffle them
        // to the top, first-popped operand uppermost.  Arguments nothing
        // else needs are consumed in place rather than duplicated.
        match arguments.as_slice() {
            [] => {}
            &[a0] => {
                if self.can_be_removed(a0, Some(class), None) {
                    let from = self.class_element_position(a0)?;
                    self.append_or_remove_swap(from)?;
                } else {
                    self.copy_to_top(a0)?;
                }
            }
            &[a0, a1] => {
                if self.can_be_removed(a1, Some(class), None) {
                    let from = self.class_element_position(a1)?;
                    self.append_or_remove_swap(from)?;
                    if a0 == a1 {
                        self.append_dup(self.stack_height)?;
                    } else if self.can_be_removed(a0, Some(class), None) {
                        self.append_or_remove_swap(self.stack_height - 1)?;
                        let from = self.class_element_position(a0)?;
                        self.append_or_remove_swap(from)?;
                    } else {
                        self.copy_to_top(a0)?;
                    }
                } else if a0 == a1 {
                    self.copy_to_top(a1)?;
                    self.append_dup(self.stack_height)?;
                } else {
                    self.copy_to_top(a1)?;
                    self.copy_to_top(a0)?;
                }
            }
            args => {
                for &argument in args.iter().rev() {
                    self.copy_to_top(argument)?;
                }
            }
        }
        for (i, &argument) in arguments.iter().enumerate() {
            let height = self.stack_height - i as i32;
            if self.stack.get(&height) != Some(&argument) {
                return Err(OptimizerError::InternalInvariant(
                    "expected operands not present on the stack",
                ));
            }
        }

        // A SWAP1 directly below a commutative operation is pointless.
        if semantics::is_commutative_operation(&item) {
            while self.generated_items.last() == Some(&AssemblyItem::Op(op::SWAP1)) {
                self.append_or_remove_swap(self.stack_height - 1)?;
            }
        }

        for i in 0..arguments.len() {
            let height = self.stack_height - i as i32;
            if let Some(consumed) = self.stack.remove(&height) {
                self.drop_position(consumed, height);
            }
        }
        let produces_value = match &item {
            AssemblyItem::Op(b) => opcodes::arity(*b)
                .map(|(_, pushes)| pushes == 1)
                .unwrap_or(false),
            _ => true,
        };
        self.append_item(item);
        if produces_value {
            self.stack.insert(self.stack_height, class);
            self.record_position(class, self.stack_height);
            Ok(self.stack_height)
        } else {
            self.class_positions.entry(class).or_default().insert(INVALID_POSITION);
            Ok(INVALID_POSITION)
        }
    }

    /// Leave a fresh copy of the class on top of the stack: DUP when within
    /// reach, otherwise recompute it from its definition.
    fn copy_to_top(&mut self, class: ClassId) -> Result<(), OptimizerError> {
        if let Some(position) = self.position_of(class) {
            let depth = 1 + self.stack_height - position;
            if depth <= 16 {
                return self.append_dup(position);
            }
        }
        self.recompute_on_top(class)
    }

    /// Re-emit the computation of a pure class whose existing copy (if any)
    /// is out of DUP reach.
    fn recompute_on_top(&mut self, class: ClassId) -> Result<(), OptimizerError> {
        let expr = self.classes.representative(class).clone();
        let depth = self
            .position_of(class)
            .map(|p| (1 + self.stack_height - p).max(0) as usize)
            .unwrap_or(0);
        if expr.sequence_number.is_some() {
            // Loads cannot be re-executed; the state may have moved on.
            return Err(OptimizerError::StackTooDeep { class, depth });
        }
        let item = match &expr.op {
            ExprOp::Item(item) => item.clone(),
            ExprOp::InitialStack(_) => {
                return Err(OptimizerError::StackTooDeep { class, depth })
            }
        };
        for &argument in expr.arguments.iter().rev() {
            self.copy_to_top(argument)?;
        }
        for i in 0..expr.arguments.len() {
            let height = self.stack_height - i as i32;
            if let Some(consumed) = self.stack.remove(&height) {
                self.drop_position(consumed, height);
            }
        }
        self.append_item(item);
        self.stack.insert(self.stack_height, class);
        self.record_position(class, self.stack_height);
        Ok(())
    }

    // -- Removal --------------------------------------------------------------

    /// True if the element's copy at `from_position` (default: its shallowest
    /// copy) may disappear, either in general or while computing `result`.
    fn can_be_removed(
        &self,
        element: ClassId,
        result: Option<ClassId>,
        from_position: Option<i32>,
    ) -> bool {
        let from = match from_position.or_else(|| self.position_of(element)) {
            Some(position) => position,
            None => return false,
        };
        let have_copy = self
            .class_positions
            .get(&element)
            .map(|set| set.iter().filter(|&&p| p != INVALID_POSITION).count() > 1)
            .unwrap_or(false);

        if self.final_classes.contains(&element) {
            // Part of the target: only spare copies away from their target
            // slot may go.
            return have_copy
                && (from > self.target_height || self.target_stack.get(&from) != Some(&element));
        }
        if !have_copy {
            if let Some(needers) = self.needed_by.get(&element) {
                for needer in needers {
                    if Some(*needer) != result && !self.class_positions.contains_key(needer) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Emit a POP if the topmost element is no longer useful.
    fn remove_stack_top_if_possible(&mut self) -> bool {
        let top = match self.stack.get(&self.stack_height) {
            Some(&class) => class,
            None => return false,
        };
        if !self.can_be_removed(top, None, Some(self.stack_height)) {
            return false;
        }
        let height = self.stack_height;
        self.stack.remove(&height);
        self.drop_position(top, height);
        self.append_item(AssemblyItem::Op(op::POP));
        true
    }

    // -- Low-level emission ----------------------------------------------------

    /// DUP the element at the given position to the top.
    fn append_dup(&mut self, from_position: i32) -> Result<(), OptimizerError> {
        let class = *self.stack.get(&from_position).ok_or(
            OptimizerError::InternalInvariant("dup from an empty stack slot"),
        )?;
        let depth = 1 + self.stack_height - from_position;
        if depth > 16 {
            return Err(OptimizerError::StackTooDeep { class, depth: depth as usize });
        }
        if depth < 1 {
            return Err(OptimizerError::InternalInvariant("invalid dup depth"));
        }
        self.append_item(AssemblyItem::Op(op::DUP1 + (depth - 1) as u8));
        self.stack.insert(self.stack_height, class);
        self.record_position(class, self.stack_height);
        Ok(())
    }

    /// SWAP the element at the given position to the top; two identical
    /// SWAPs in a row cancel out.
    fn append_or_remove_swap(&mut self, from_position: i32) -> Result<(), OptimizerError> {
        if from_position == self.stack_height {
            return Ok(());
        }
        let depth = self.stack_height - from_position;
        if depth > 16 {
            let class = *self.stack.get(&from_position).ok_or(
                OptimizerError::InternalInvariant("swap from an empty stack slot"),
            )?;
            return Err(OptimizerError::StackTooDeep { class, depth: depth as usize });
        }
        if depth < 1 {
            return Err(OptimizerError::InternalInvariant("invalid swap depth"));
        }
        let top = *self.stack.get(&self.stack_height).ok_or(
            OptimizerError::InternalInvariant("swap with an empty stack top"),
        )?;
        let deep = *self.stack.get(&from_position).ok_or(
            OptimizerError::InternalInvariant("swap from an empty stack slot"),
        )?;
        self.append_item(AssemblyItem::Op(op::SWAP1 + (depth - 1) as u8));
        if top != deep {
            self.stack.insert(self.stack_height, deep);
            self.stack.insert(from_position, top);
            self.move_position(top, self.stack_height, from_position);
            self.move_position(deep, from_position, self.stack_height);
        }
        let n = self.generated_items.len();
        if n >= 2
            && semantics::is_swap_instruction(&self.generated_items[n - 1])
            && self.generated_items[n - 1] == self.generated_items[n - 2]
        {
            self.generated_items.truncate(n - 2);
        }
        Ok(())
    }

    fn append_item(&mut self, item: AssemblyItem) {
        self.stack_height += item.deposit();
        log::trace!("emit {item} (height {})", self.stack_height);
        self.generated_items.push(item);
    }

    // -- Position bookkeeping ---------------------------------------------------

    /// The shallowest live position of a class, if any.
    fn position_of(&self, class: ClassId) -> Option<i32> {
        match self.class_positions.get(&class)?.iter().next_back() {
            Some(&position) if position != INVALID_POSITION => Some(position),
            _ => None,
        }
    }

    /// Like `position_of`, but an internal error when absent.
    fn class_element_position(&self, class: ClassId) -> Result<i32, OptimizerError> {
        self.position_of(class).ok_or(OptimizerError::InternalInvariant(
            "class requested but not present on the stack",
        ))
    }

    fn record_position(&mut self, class: ClassId, height: i32) {
        let set = self.class_positions.entry(class).or_default();
        set.remove(&INVALID_POSITION);
        set.insert(height);
    }

    fn drop_position(&mut self, class: ClassId, height: i32) {
        if let Some(set) = self.class_positions.get_mut(&class) {
            set.remove(&height);
            if set.is_empty() {
                set.insert(INVALID_POSITION);
            }
        }
    }

    fn move_position(&mut self, class: ClassId, from: i32, to: i32) {
        if let Some(set) = self.class_positions.get_mut(&class) {
            set.remove(&from);
            set.insert(to);
        }
    }
}
