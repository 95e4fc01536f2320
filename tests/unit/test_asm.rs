//! Assembly item formatting, parsing and serialization.

use massilia::asm::{parse_assembly, AssemblyItem};
use massilia::errors::AsmParseError;
use massilia::utils::opcodes::op;
use primitive_types::U256;

#[test]
fn test_parse_full_listing() {
    let text = "\
# a tiny block
push 0x1
push 2
add
tag 1
pushtag 1
jump
";
    let items = parse_assembly(text).unwrap();
    assert_eq!(
        items,
        vec![
            AssemblyItem::push(1),
            AssemblyItem::push(2),
            AssemblyItem::Op(op::ADD),
            AssemblyItem::Tag(1),
            AssemblyItem::PushTag(1),
            AssemblyItem::Op(op::JUMP),
        ]
    );
}

#[test]
fn test_parse_error_carries_line_number() {
    let err = parse_assembly("add\nmystery\n").unwrap_err();
    match err {
        AsmParseError::UnknownMnemonic { line, text } => {
            assert_eq!(line, 2);
            assert_eq!(text, "mystery");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_parse_large_value() {
    let items = parse_assembly(&format!("push 0x{:x}\n", U256::MAX)).unwrap();
    assert_eq!(items, vec![AssemblyItem::Push(U256::MAX)]);
}

#[test]
fn test_display_roundtrip_listing() {
    let items = vec![
        AssemblyItem::push(0xABCD),
        AssemblyItem::Op(op::MSTORE),
        AssemblyItem::PushSub(2),
        AssemblyItem::PushSubSize(2),
        AssemblyItem::PushProgramSize,
        AssemblyItem::PushData(U256::from(0x1234u64)),
        AssemblyItem::Op(op::SWAP16),
    ];
    let text: String = items.iter().map(|i| format!("{i}\n")).collect();
    assert_eq!(parse_assembly(&text).unwrap(), items);
}

#[test]
fn test_json_shape() {
    let json = serde_json::to_string(&AssemblyItem::push(255)).unwrap();
    assert_eq!(json, r#"{"Push":"0xff"}"#);
    let back: AssemblyItem = serde_json::from_str(&json).unwrap();
    assert_eq!(back, AssemblyItem::push(255));
}

#[test]
fn test_deposit_of_linker_pushes() {
    assert_eq!(AssemblyItem::PushTag(1).deposit(), 1);
    assert_eq!(AssemblyItem::PushSub(1).deposit(), 1);
    assert_eq!(AssemblyItem::PushProgramSize.deposit(), 1);
    assert_eq!(AssemblyItem::Op(op::CALL).deposit(), -6);
}
