//! Concrete EVM arithmetic operations.
//!
//! All functions operate on `U256` and mirror the EVM specification exactly.
//! Signed operations interpret their operands as 256-bit two's complement.

use primitive_types::U256;

/// 2^256 is handled implicitly by U256 wrapping.
const UINT_256_MAX: U256 = U256::MAX;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sign bit of a 256-bit two's-complement value.
fn is_negative(value: U256) -> bool {
    value.bit(255)
}

/// Two's-complement negation: `2^256 − value`.
fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

/// Absolute value under two's-complement interpretation.
fn abs(value: U256) -> U256 {
    if is_negative(value) {
        negate(value)
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Arithmetic operations
// ---------------------------------------------------------------------------

/// EVM ADD: wrapping addition mod 2^256.
pub fn add(a: U256, b: U256) -> U256 {
    a.overflowing_add(b).0
}

/// EVM SUB: wrapping subtraction mod 2^256.
pub fn sub(a: U256, b: U256) -> U256 {
    a.overflowing_sub(b).0
}

/// EVM MUL: wrapping multiplication mod 2^256.
pub fn mul(a: U256, b: U256) -> U256 {
    a.overflowing_mul(b).0
}

/// EVM DIV: unsigned integer division (returns 0 on divide-by-zero).
pub fn div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        U256::zero()
    } else {
        a / b
    }
}

/// EVM SDIV: signed integer division, truncating towards zero
/// (returns 0 on divide-by-zero).
pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let quotient = abs(a) / abs(b);
    if is_negative(a) != is_negative(b) {
        negate(quotient)
    } else {
        quotient
    }
}

/// EVM MOD: unsigned modulo (returns 0 when modulus is zero).
pub fn modulo(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        U256::zero()
    } else {
        a % b
    }
}

/// EVM SMOD: signed modulo; the result takes the sign of the dividend
/// (returns 0 when modulus is zero).
pub fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let remainder = abs(a) % abs(b);
    if is_negative(a) {
        negate(remainder)
    } else {
        remainder
    }
}

/// EVM ADDMOD: `(a + b) % m` using 512-bit intermediate to avoid overflow.
pub fn addmod(a: U256, b: U256, m: U256) -> U256 {
    if m.is_zero() {
        U256::zero()
    } else {
        let a512 = primitive_types::U512::from(a);
        let b512 = primitive_types::U512::from(b);
        let m512 = primitive_types::U512::from(m);
        let result = (a512 + b512) % m512;
        u512_to_u256(result)
    }
}

/// EVM MULMOD: `(a * b) % m` using 512-bit intermediate to avoid overflow.
pub fn mulmod(a: U256, b: U256, m: U256) -> U256 {
    if m.is_zero() {
        U256::zero()
    } else {
        let a512 = primitive_types::U512::from(a);
        let b512 = primitive_types::U512::from(b);
        let m512 = primitive_types::U512::from(m);
        let result = (a512 * b512) % m512;
        u512_to_u256(result)
    }
}

/// Convert a U512 to U256 by taking the low 256 bits.
fn u512_to_u256(v: primitive_types::U512) -> U256 {
    // Extract the low 4 u64 limbs from U512 (which has 8 limbs).
    let limbs = v.0;
    U256([limbs[0], limbs[1], limbs[2], limbs[3]])
}

/// EVM EXP: modular exponentiation `base^exponent mod 2^256`.
pub fn exp(base: U256, exponent: U256) -> U256 {
    if exponent.is_zero() {
        return U256::one();
    }
    if base.is_zero() {
        return U256::zero();
    }
    // Square-and-multiply mod 2^256.
    let mut result = U256::one();
    let mut b = base;
    let mut e = exponent;
    while !e.is_zero() {
        if e.bit(0) {
            result = result.overflowing_mul(b).0;
        }
        e >>= 1;
        if !e.is_zero() {
            b = b.overflowing_mul(b).0;
        }
    }
    result
}

/// EVM SIGNEXTEND: extend the sign bit at byte position `bits`.
pub fn signextend(bits: U256, value: U256) -> U256 {
    if bits < U256::from(31u64) {
        let bit_index = bits.low_u64() * 8 + 7;
        let sign_bit = U256::one() << bit_index as usize;
        if !(value & sign_bit).is_zero() {
            value | (UINT_256_MAX - sign_bit + U256::one())
        } else {
            value & (sign_bit - U256::one())
        }
    } else {
        value
    }
}

// -- Comparison operations -------------------------------------------------

/// EVM LT: unsigned less-than comparison.
pub fn lt(a: U256, b: U256) -> U256 {
    if a < b { U256::one() } else { U256::zero() }
}

/// EVM GT: unsigned greater-than comparison.
pub fn gt(a: U256, b: U256) -> U256 {
    if a > b { U256::one() } else { U256::zero() }
}

/// EVM SLT: signed less-than comparison (two's complement).
pub fn slt(a: U256, b: U256) -> U256 {
    let result = match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        // Same sign: two's-complement order matches unsigned order.
        _ => a < b,
    };
    if result { U256::one() } else { U256::zero() }
}

/// EVM SGT: signed greater-than comparison (two's complement).
pub fn sgt(a: U256, b: U256) -> U256 {
    slt(b, a)
}

/// EVM EQ: equality comparison.
pub fn eq(a: U256, b: U256) -> U256 {
    if a == b { U256::one() } else { U256::zero() }
}

/// EVM ISZERO: returns 1 if the value is zero, 0 otherwise.
pub fn iszero(a: U256) -> U256 {
    if a.is_zero() { U256::one() } else { U256::zero() }
}

// -- Bitwise operations ----------------------------------------------------

/// EVM AND: bitwise AND.
pub fn and(a: U256, b: U256) -> U256 {
    a & b
}

/// EVM OR: bitwise OR.
pub fn or(a: U256, b: U256) -> U256 {
    a | b
}

/// EVM XOR: bitwise XOR.
pub fn xor(a: U256, b: U256) -> U256 {
    a ^ b
}

/// EVM NOT: bitwise complement.
pub fn not(a: U256) -> U256 {
    !a
}

/// EVM BYTE: extract a single byte from a 32-byte value at the given position.
pub fn byte_op(position: U256, value: U256) -> U256 {
    if position >= U256::from(32u64) {
        U256::zero()
    } else {
        let shift = (31 - position.low_u64()) * 8;
        (value >> shift as usize) & U256::from(0xFFu64)
    }
}

// -- Shift operations (Constantinople) -------------------------------------

/// EVM SHL: logical shift left.
pub fn shl(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256u64) {
        U256::zero()
    } else {
        value << shift.low_u64() as usize
    }
}

/// EVM SHR: logical shift right.
pub fn shr(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256u64) {
        U256::zero()
    } else {
        value >> shift.low_u64() as usize
    }
}

/// EVM SAR: arithmetic shift right (preserves sign).
pub fn sar(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256u64) {
        return if is_negative(value) { UINT_256_MAX } else { U256::zero() };
    }
    let s = shift.low_u64() as usize;
    let shifted = value >> s;
    if is_negative(value) && s > 0 {
        // Fill the vacated high bits with ones.
        shifted | !(UINT_256_MAX >> s)
    } else {
        shifted
    }
}

// ---------------------------------------------------------------------------
// Dispatch table
// ---------------------------------------------------------------------------

/// Evaluate a concrete binary / unary / ternary opcode.
/// Returns `None` if the opcode is not a pure arithmetic one.
///
/// Operand order matches the EVM stack: `args[0]` is the topmost operand.
pub fn eval_concrete(op: &str, args: &[U256]) -> Option<U256> {
    match (op, args) {
        ("add", [a, b])          => Some(add(*a, *b)),
        ("sub", [a, b])          => Some(sub(*a, *b)),
        ("mul", [a, b])          => Some(mul(*a, *b)),
        ("div", [a, b])          => Some(div(*a, *b)),
        ("sdiv", [a, b])         => Some(sdiv(*a, *b)),
        ("mod", [a, b])          => Some(modulo(*a, *b)),
        ("smod", [a, b])         => Some(smod(*a, *b)),
        ("addmod", [a, b, c])    => Some(addmod(*a, *b, *c)),
        ("mulmod", [a, b, c])    => Some(mulmod(*a, *b, *c)),
        ("exp", [a, b])          => Some(exp(*a, *b)),
        ("signextend", [a, b])   => Some(signextend(*a, *b)),
        ("lt", [a, b])           => Some(lt(*a, *b)),
        ("gt", [a, b])           => Some(gt(*a, *b)),
        ("slt", [a, b])          => Some(slt(*a, *b)),
        ("sgt", [a, b])          => Some(sgt(*a, *b)),
        ("eq", [a, b])           => Some(eq(*a, *b)),
        ("iszero", [a])          => Some(iszero(*a)),
        ("and", [a, b])          => Some(and(*a, *b)),
        ("or", [a, b])           => Some(or(*a, *b)),
        ("xor", [a, b])          => Some(xor(*a, *b)),
        ("not", [a])             => Some(not(*a)),
        ("byte", [a, b])         => Some(byte_op(*a, *b)),
        ("shl", [a, b])          => Some(shl(*a, *b)),
        ("shr", [a, b])          => Some(shr(*a, *b)),
        ("sar", [a, b])          => Some(sar(*a, *b)),
        _ => None,
    }
}
