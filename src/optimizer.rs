//! Whole-stream driver: split at basic-block boundaries, optimize each block
//! with a fresh analyzer/generator pair, fall back to the original items
//! whenever that is shorter or the optimizer gives up.

use crate::analyzer::CommonSubexpressionEliminator;
use crate::asm::AssemblyItem;
use crate::semantics;

/// Optimize a full item stream.  Boundary items are copied through
/// unchanged; a block is replaced only when the optimized version is
/// strictly shorter.  Never fails: any optimizer error degrades to keeping
/// the block as-is.
pub fn optimize_items(items: &[AssemblyItem]) -> Vec<AssemblyItem> {
    let mut output = Vec::with_capacity(items.len());
    let mut rest = items;

    while let Some(first) = rest.first() {
        if semantics::breaks_basic_block(first) {
            output.push(first.clone());
            rest = &rest[1..];
            continue;
        }

        let mut cse = CommonSubexpressionEliminator::new();
        let tail = match cse.feed_items(rest) {
            Ok(tail) => tail,
            Err(err) => {
                // Malformed block: copy it through verbatim.
                log::warn!("block analysis abandoned: {err}");
                let len = rest
                    .iter()
                    .position(semantics::breaks_basic_block)
                    .unwrap_or(rest.len());
                output.extend_from_slice(&rest[..len]);
                rest = &rest[len..];
                continue;
            }
        };
        let block = &rest[..rest.len() - tail.len()];

        match cse.optimized_items() {
            Ok(optimized) if optimized.len() < block.len() => {
                log::debug!(
                    "block shrank from {} to {} items",
                    block.len(),
                    optimized.len()
                );
                output.extend(optimized);
            }
            Ok(_) => output.extend_from_slice(block),
            Err(err) => {
                log::warn!("block optimization abandoned: {err}");
                output.extend_from_slice(block);
            }
        }
        rest = tail;
    }

    output
}
