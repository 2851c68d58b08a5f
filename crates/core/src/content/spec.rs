//! Known content stream operators.
//!
//! A static table sorted by name, looked up by binary search. Each entry
//! lists one acceptance mask per operand position, left to right. Operands
//! precede their operator, so validation walks the operand stack from the
//! top down and matches masks right-aligned.
//!
//! `SC`/`sc` and `SCN`/`scn` take a variable number of colour components;
//! their entries carry a minimum count below the mask count.

use crate::model::operand::{KindMask, ObjKind, Operand};
use std::fmt;

/// Maximum operand count of any known operator.
pub const MAX_OPERANDS: usize = 6;

/// Operand shape of one known operator.
#[derive(Debug, PartialEq, Eq)]
pub struct OperatorSpec {
    pub name: &'static str,
    /// Fewest operands accepted; equals `masks.len()` for fixed arity
    pub min_operands: usize,
    /// Accepted kinds per position, left to right
    pub masks: &'static [KindMask],
}

impl OperatorSpec {
    /// Maximum (for fixed arity: exact) operand count.
    pub const fn arity(&self) -> usize {
        self.masks.len()
    }

    pub const fn is_variadic(&self) -> bool {
        self.min_operands != self.masks.len()
    }
}

/// Why a set of operands does not fit an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecMismatch {
    /// Operand position (left to right) that failed
    pub position: usize,
    /// Kinds accepted at that position
    pub expected: KindMask,
    /// Kind found there, `None` if the operand is missing
    pub found: Option<ObjKind>,
}

impl fmt::Display for SpecMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.found {
            Some(kind) => write!(
                f,
                "operand {} has kind {kind}, expected mask {:#06x}",
                self.position,
                self.expected.bits()
            ),
            None => write!(f, "operand {} is missing", self.position),
        }
    }
}

const N: KindMask = KindMask::NUMBER;
const I: KindMask = KindMask::INT;
const S: KindMask = KindMask::STRING;
const NM: KindMask = KindMask::NAME;
const A: KindMask = KindMask::ARRAY;
const DN: KindMask = KindMask::DICT_OR_NAME;
const NN: KindMask = KindMask::NUMBER_OR_NAME;

const fn op(name: &'static str, masks: &'static [KindMask]) -> OperatorSpec {
    OperatorSpec {
        name,
        min_operands: masks.len(),
        masks,
    }
}

const fn var(name: &'static str, min_operands: usize, masks: &'static [KindMask]) -> OperatorSpec {
    OperatorSpec {
        name,
        min_operands,
        masks,
    }
}

/// All known operators, sorted by name (byte order).
pub static KNOWN_OPERATORS: &[OperatorSpec] = &[
    op("\"", &[N, N, S]),
    op("'", &[S]),
    op("B", &[]),
    op("B*", &[]),
    op("BDC", &[NM, DN]),
    op("BI", &[]),
    op("BMC", &[NM]),
    op("BT", &[]),
    op("BX", &[]),
    op("CS", &[NM]),
    op("DP", &[NM, DN]),
    op("Do", &[NM]),
    op("EI", &[]),
    op("EMC", &[]),
    op("ET", &[]),
    op("EX", &[]),
    op("F", &[]),
    op("G", &[N]),
    op("ID", &[]),
    op("J", &[I]),
    op("K", &[N, N, N, N]),
    op("M", &[N]),
    op("MP", &[NM]),
    op("Q", &[]),
    op("RG", &[N, N, N]),
    op("S", &[]),
    var("SC", 1, &[N, N, N, N]),
    var("SCN", 1, &[N, N, N, N, NN]),
    op("T*", &[]),
    op("TD", &[N, N]),
    op("TJ", &[A]),
    op("TL", &[N]),
    op("Tc", &[N]),
    op("Td", &[N, N]),
    op("Tf", &[NM, N]),
    op("Tj", &[S]),
    op("Tm", &[N, N, N, N, N, N]),
    op("Tr", &[I]),
    op("Ts", &[N]),
    op("Tw", &[N]),
    op("Tz", &[N]),
    op("W", &[]),
    op("W*", &[]),
    op("b", &[]),
    op("b*", &[]),
    op("c", &[N, N, N, N, N, N]),
    op("cm", &[N, N, N, N, N, N]),
    op("cs", &[NM]),
    op("d", &[A, N]),
    op("d0", &[N, N]),
    op("d1", &[N, N, N, N, N, N]),
    op("f", &[]),
    op("f*", &[]),
    op("g", &[N]),
    op("gs", &[NM]),
    op("h", &[]),
    op("i", &[N]),
    op("j", &[I]),
    op("k", &[N, N, N, N]),
    op("l", &[N, N]),
    op("m", &[N, N]),
    op("n", &[]),
    op("q", &[]),
    op("re", &[N, N, N, N]),
    op("rg", &[N, N, N]),
    op("ri", &[NM]),
    op("s", &[]),
    var("sc", 1, &[N, N, N, N]),
    var("scn", 1, &[N, N, N, N, NN]),
    op("sh", &[NM]),
    op("v", &[N, N, N, N]),
    op("w", &[N]),
    op("y", &[N, N, N, N]),
];

/// Find the spec of a known operator.
pub fn lookup(name: &str) -> Option<&'static OperatorSpec> {
    KNOWN_OPERATORS
        .binary_search_by(|spec| spec.name.cmp(name))
        .ok()
        .map(|idx| &KNOWN_OPERATORS[idx])
}

/// Check the top of an operand stack against `spec`.
///
/// Returns how many operands (from the top of the stack) the operator
/// consumes. Variable-arity operators take as many as fit.
pub fn validate(spec: &OperatorSpec, stack: &[Operand]) -> Result<usize, SpecMismatch> {
    let max = spec.arity();
    let available = stack.len().min(max);
    if available < spec.min_operands || (!spec.is_variadic() && available < max) {
        // Supplied operands are right-aligned; report the gap next to them.
        let position = max - available - 1;
        return Err(SpecMismatch {
            position,
            expected: spec.masks[position],
            found: None,
        });
    }
    let take = if spec.is_variadic() { available } else { max };

    for (distance, operand) in stack.iter().rev().take(take).enumerate() {
        let position = max - 1 - distance;
        let expected = spec.masks[position];
        if !expected.accepts(operand.kind()) {
            return Err(SpecMismatch {
                position,
                expected,
                found: Some(operand.kind()),
            });
        }
    }
    Ok(take)
}
