//! Tests for the operator table and operand validation.

use quire_core::content::{KNOWN_OPERATORS, lookup, validate};
use quire_core::model::{KindMask, ObjKind, Operand};

// ============================================================================
// Table shape
// ============================================================================

#[test]
fn test_table_is_sorted_by_name() {
    for pair in KNOWN_OPERATORS.windows(2) {
        assert!(
            pair[0].name < pair[1].name,
            "{:?} must sort before {:?}",
            pair[0].name,
            pair[1].name
        );
    }
}

#[test]
fn test_lookup_finds_every_entry() {
    for spec in KNOWN_OPERATORS {
        let found = lookup(spec.name).expect("entry is found by name");
        assert_eq!(found.name, spec.name);
    }
    assert!(lookup("foo").is_none());
    assert!(lookup("").is_none());
}

#[test]
fn test_fixed_arity_entries() {
    assert_eq!(lookup("cm").map(|s| s.arity()), Some(6));
    assert_eq!(lookup("Tf").map(|s| s.arity()), Some(2));
    assert_eq!(lookup("BT").map(|s| s.arity()), Some(0));
    assert!(!lookup("RG").expect("RG").is_variadic());
}

#[test]
fn test_colour_operators_are_variadic() {
    for name in ["SC", "sc", "SCN", "scn"] {
        let spec = lookup(name).expect("colour operator");
        assert!(spec.is_variadic(), "{name} takes a variable operand count");
        assert_eq!(spec.min_operands, 1);
    }
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validate_exact_operands() {
    let spec = lookup("RG").expect("RG");
    let stack = [Operand::int(1), Operand::int(0), Operand::real(0.5)];
    assert_eq!(validate(spec, &stack), Ok(3));
}

#[test]
fn test_validate_reports_bad_position() {
    let spec = lookup("RG").expect("RG");
    let stack = [
        Operand::int(1),
        Operand::int(0),
        Operand::int(0),
        Operand::string(b"x".to_vec()),
    ];
    let mismatch = validate(spec, &stack).expect_err("string in a number slot");
    assert_eq!(mismatch.position, 2);
    assert_eq!(mismatch.found, Some(ObjKind::String));
    assert_eq!(mismatch.expected, KindMask::NUMBER);
}

#[test]
fn test_validate_missing_operand() {
    let spec = lookup("Tf").expect("Tf");
    let mismatch = validate(spec, &[Operand::int(12)]).expect_err("font name missing");
    assert_eq!(mismatch.position, 0);
    assert_eq!(mismatch.found, None);
}

#[test]
fn test_validate_consumes_only_arity() {
    // Deeper operands belong to nobody; the caller reports them.
    let spec = lookup("g").expect("g");
    let stack = [Operand::int(1), Operand::real(0.5)];
    assert_eq!(validate(spec, &stack), Ok(1));
}

#[test]
fn test_validate_variadic_colour() {
    let sc = lookup("sc").expect("sc");
    assert_eq!(validate(sc, &[Operand::real(0.5)]), Ok(1));
    assert_eq!(
        validate(sc, &[Operand::int(1), Operand::int(0), Operand::int(0)]),
        Ok(3)
    );

    let scn = lookup("scn").expect("scn");
    assert_eq!(validate(scn, &[Operand::name("P1")]), Ok(1));
    let stack = [
        Operand::real(0.1),
        Operand::real(0.2),
        Operand::real(0.3),
        Operand::name("P1"),
    ];
    assert_eq!(validate(scn, &stack), Ok(4));
    assert!(validate(sc, &[Operand::name("P1")]).is_err());
}

#[test]
fn test_validate_marked_content_properties() {
    let bdc = lookup("BDC").expect("BDC");
    assert_eq!(
        validate(bdc, &[Operand::name("Span"), Operand::name("MC0")]),
        Ok(2)
    );
    let mut props = indexmap::IndexMap::new();
    props.insert("MCID".to_string(), Operand::int(3));
    assert_eq!(
        validate(bdc, &[Operand::name("Span"), Operand::dict(props)]),
        Ok(2)
    );
}
