//! Expression class interning and simplification.

use massilia::asm::AssemblyItem as Item;
use massilia::classes::{ExprOp, ExpressionClasses};
use massilia::utils::opcodes::op;
use primitive_types::U256;

fn operation(byte: u8) -> ExprOp {
    ExprOp::Item(Item::Op(byte))
}

#[test]
fn test_fold_each_family() {
    let mut ec = ExpressionClasses::new();
    let a = ec.find_constant(U256::from(12u64));
    let b = ec.find_constant(U256::from(5u64));

    let cases: &[(u8, u64)] = &[
        (op::ADD, 17),
        (op::SUB, 7),
        (op::MUL, 60),
        (op::DIV, 2),
        (op::MOD, 2),
        (op::EXP, 248_832),
        (op::LT, 0),
        (op::GT, 1),
        (op::EQ, 0),
        (op::AND, 4),
        (op::OR, 13),
        (op::XOR, 9),
        (op::SHR, 0),
    ];
    for &(byte, expected) in cases {
        let id = ec.find(operation(byte), vec![a, b], None);
        assert_eq!(
            ec.known_constant(id),
            Some(U256::from(expected)),
            "opcode 0x{byte:02x}"
        );
    }
}

#[test]
fn test_fold_signed_family() {
    let mut ec = ExpressionClasses::new();
    let neg6 = ec.find_constant(U256::zero().overflowing_sub(U256::from(6u64)).0);
    let three = ec.find_constant(U256::from(3u64));

    let sdiv = ec.find(operation(op::SDIV), vec![neg6, three], None);
    let expected = U256::zero().overflowing_sub(U256::from(2u64)).0;
    assert_eq!(ec.known_constant(sdiv), Some(expected));

    let slt = ec.find(operation(op::SLT), vec![neg6, three], None);
    assert_eq!(ec.known_constant(slt), Some(U256::one()));
}

#[test]
fn test_iszero_and_not_fold() {
    let mut ec = ExpressionClasses::new();
    let zero = ec.find_constant(U256::zero());
    let z = ec.find(operation(op::ISZERO), vec![zero], None);
    assert_eq!(ec.known_constant(z), Some(U256::one()));

    let n = ec.find(operation(op::NOT), vec![zero], None);
    assert_eq!(ec.known_constant(n), Some(U256::MAX));
}

#[test]
fn test_commutative_same_class_across_instances() {
    // Two universes fed the same leaves in the same order assign the same
    // class to `a+b` and `b+a`.
    let build = |flip: bool| {
        let mut ec = ExpressionClasses::new();
        let a = ec.find(operation(op::CALLER), vec![], None);
        let b = ec.find(operation(op::CALLVALUE), vec![], None);
        let args = if flip { vec![b, a] } else { vec![a, b] };
        ec.find(operation(op::ADD), args, None)
    };
    assert_eq!(build(false), build(true));
}

#[test]
fn test_simplified_spelling_maps_to_same_class() {
    let mut ec = ExpressionClasses::new();
    let x = ec.find(operation(op::CALLER), vec![], None);
    let zero = ec.find_constant(U256::zero());
    // x + 0 simplifies to x; looking the sum up again must not mint a class.
    let before = ec.len();
    let s1 = ec.find(operation(op::ADD), vec![x, zero], None);
    let s2 = ec.find(operation(op::ADD), vec![zero, x], None);
    assert_eq!(s1, x);
    assert_eq!(s2, x);
    assert_eq!(ec.len(), before);
}

#[test]
fn test_nested_fold() {
    // (2 + 3) * (2 + 3) folds all the way down to 25.
    let mut ec = ExpressionClasses::new();
    let two = ec.find_constant(U256::from(2u64));
    let three = ec.find_constant(U256::from(3u64));
    let sum1 = ec.find(operation(op::ADD), vec![two, three], None);
    let sum2 = ec.find(operation(op::ADD), vec![three, two], None);
    assert_eq!(sum1, sum2);
    let product = ec.find(operation(op::MUL), vec![sum1, sum2], None);
    assert_eq!(ec.known_constant(product), Some(U256::from(25u64)));
}

#[test]
fn test_sequenced_never_folds() {
    let mut ec = ExpressionClasses::new();
    let one = ec.find_constant(U256::one());
    // A load from slot 1 is not the constant 1, whatever the rewrite set says.
    let load = ec.find(operation(op::SLOAD), vec![one], Some(3));
    assert_eq!(ec.known_constant(load), None);
}

#[test]
fn test_representative_structure() {
    let mut ec = ExpressionClasses::new();
    let a = ec.find(operation(op::CALLER), vec![], None);
    let b = ec.find(operation(op::CALLVALUE), vec![], None);
    let sum = ec.find(operation(op::ADD), vec![b, a], None);
    let rep = ec.representative(sum);
    assert_eq!(rep.op, operation(op::ADD));
    // Arguments are stored in canonical (sorted) order.
    assert_eq!(rep.arguments, vec![a, b]);
    assert_eq!(rep.sequence_number, None);
}
