//! 256-bit unsigned machine word
//!
//! Every stack value is a `Word`. Arithmetic is checked: callers turn `None`
//! into a fatal VM error instead of wrapping.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAnd, BitOr, Shl, Shr};

/// Number of bits in a word
pub const WORD_BITS: u32 = 256;

const LIMBS: usize = 4;

/// Unsigned 256-bit integer stored as little-endian 64-bit limbs
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Word([u64; LIMBS]);

impl Word {
    pub const ZERO: Word = Word([0; LIMBS]);
    pub const ONE: Word = Word([1, 0, 0, 0]);
    pub const MAX: Word = Word([u64::MAX; LIMBS]);

    pub const fn from_u64(value: u64) -> Self {
        Word([value, 0, 0, 0])
    }

    /// Build from limbs, least significant first
    pub const fn from_limbs(limbs: [u64; LIMBS]) -> Self {
        Word(limbs)
    }

    pub fn limbs(&self) -> [u64; LIMBS] {
        self.0
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; LIMBS];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            limbs[LIMBS - 1 - i] = u64::from_be_bytes(buf);
        }
        Word(limbs)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, limb) in self.0.iter().rev().enumerate() {
            bytes[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_be_bytes());
        }
        bytes
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; LIMBS]
    }

    /// Lowest 64 bits
    pub fn low_u64(&self) -> u64 {
        self.0[0]
    }

    /// Value as `u64` if it fits
    pub fn to_u64(&self) -> Option<u64> {
        if self.0[1..].iter().all(|&l| l == 0) {
            Some(self.0[0])
        } else {
            None
        }
    }

    /// Value as `usize` if it fits
    pub fn to_usize(&self) -> Option<usize> {
        self.to_u64().and_then(|v| usize::try_from(v).ok())
    }

    /// Number of significant bits
    pub fn bits(&self) -> u32 {
        for i in (0..LIMBS).rev() {
            if self.0[i] != 0 {
                return (i as u32) * 64 + (64 - self.0[i].leading_zeros());
            }
        }
        0
    }

    pub fn bit(&self, index: u32) -> bool {
        if index >= WORD_BITS {
            return false;
        }
        (self.0[(index / 64) as usize] >> (index % 64)) & 1 == 1
    }

    fn set_bit(&mut self, index: u32) {
        self.0[(index / 64) as usize] |= 1 << (index % 64);
    }

    /// Lowest `bits` bits (all of them for `bits >= 256`)
    pub fn low_bits(self, bits: u32) -> Word {
        if bits >= WORD_BITS {
            return self;
        }
        let mask = (Word::ONE << bits).wrapping_sub(Word::ONE);
        self & mask
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    fn overflowing_add(self, rhs: Word) -> (Word, bool) {
        let mut out = [0u64; LIMBS];
        let mut carry = false;
        for (i, slot) in out.iter_mut().enumerate() {
            let (sum, c1) = self.0[i].overflowing_add(rhs.0[i]);
            let (sum, c2) = sum.overflowing_add(u64::from(carry));
            *slot = sum;
            carry = c1 || c2;
        }
        (Word(out), carry)
    }

    fn overflowing_sub(self, rhs: Word) -> (Word, bool) {
        let mut out = [0u64; LIMBS];
        let mut borrow = false;
        for (i, slot) in out.iter_mut().enumerate() {
            let (diff, b1) = self.0[i].overflowing_sub(rhs.0[i]);
            let (diff, b2) = diff.overflowing_sub(u64::from(borrow));
            *slot = diff;
            borrow = b1 || b2;
        }
        (Word(out), borrow)
    }

    pub fn checked_add(self, rhs: Word) -> Option<Word> {
        match self.overflowing_add(rhs) {
            (sum, false) => Some(sum),
            (_, true) => None,
        }
    }

    pub fn checked_sub(self, rhs: Word) -> Option<Word> {
        match self.overflowing_sub(rhs) {
            (diff, false) => Some(diff),
            (_, true) => None,
        }
    }

    pub fn wrapping_sub(self, rhs: Word) -> Word {
        self.overflowing_sub(rhs).0
    }

    pub fn checked_mul(self, rhs: Word) -> Option<Word> {
        let mut wide = [0u64; LIMBS * 2];
        for i in 0..LIMBS {
            let mut carry: u128 = 0;
            for j in 0..LIMBS {
                let cur = u128::from(wide[i + j])
                    + u128::from(self.0[i]) * u128::from(rhs.0[j])
                    + carry;
                wide[i + j] = cur as u64;
                carry = cur >> 64;
            }
            wide[i + LIMBS] = carry as u64;
        }
        if wide[LIMBS..].iter().any(|&l| l != 0) {
            return None;
        }
        let mut out = [0u64; LIMBS];
        out.copy_from_slice(&wide[..LIMBS]);
        Some(Word(out))
    }

    /// Quotient and remainder; `None` when dividing by zero
    pub fn div_rem(self, rhs: Word) -> Option<(Word, Word)> {
        if rhs.is_zero() {
            return None;
        }
        if self < rhs {
            return Some((Word::ZERO, self));
        }

        let mut quotient = Word::ZERO;
        let mut remainder = Word::ZERO;
        for i in (0..self.bits()).rev() {
            let carried = remainder.bit(WORD_BITS - 1);
            remainder = remainder << 1;
            if self.bit(i) {
                remainder.0[0] |= 1;
            }
            // A carried-out top bit means the true remainder exceeds 256 bits,
            // so it is certainly >= rhs and the wrapped difference is exact.
            if carried || remainder >= rhs {
                remainder = remainder.wrapping_sub(rhs);
                quotient.set_bit(i);
            }
        }
        Some((quotient, remainder))
    }

    pub fn checked_div(self, rhs: Word) -> Option<Word> {
        self.div_rem(rhs).map(|(q, _)| q)
    }

    pub fn checked_rem(self, rhs: Word) -> Option<Word> {
        self.div_rem(rhs).map(|(_, r)| r)
    }

    pub fn checked_pow(self, exponent: Word) -> Option<Word> {
        let mut result = Word::ONE;
        let mut base = self;
        let mut exponent = exponent;
        while !exponent.is_zero() {
            if exponent.bit(0) {
                result = result.checked_mul(base)?;
            }
            exponent = exponent >> 1;
            if !exponent.is_zero() {
                base = base.checked_mul(base)?;
            }
        }
        Some(result)
    }

    /// Divide by a small divisor, returning the remainder as `u64`
    fn div_rem_u64(self, divisor: u64) -> (Word, u64) {
        let mut out = [0u64; LIMBS];
        let mut rem: u128 = 0;
        for i in (0..LIMBS).rev() {
            let cur = (rem << 64) | u128::from(self.0[i]);
            out[i] = (cur / u128::from(divisor)) as u64;
            rem = cur % u128::from(divisor);
        }
        (Word(out), rem as u64)
    }
}

impl Ord for Word {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..LIMBS).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Word {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Bit operations
// ============================================================================

impl Shl<u32> for Word {
    type Output = Word;

    fn shl(self, shift: u32) -> Word {
        if shift >= WORD_BITS {
            return Word::ZERO;
        }
        let limb_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;
        let mut out = [0u64; LIMBS];
        for i in limb_shift..LIMBS {
            let src = i - limb_shift;
            out[i] = self.0[src] << bit_shift;
            if bit_shift > 0 && src > 0 {
                out[i] |= self.0[src - 1] >> (64 - bit_shift);
            }
        }
        Word(out)
    }
}

impl Shr<u32> for Word {
    type Output = Word;

    fn shr(self, shift: u32) -> Word {
        if shift >= WORD_BITS {
            return Word::ZERO;
        }
        let limb_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;
        let mut out = [0u64; LIMBS];
        for (i, slot) in out.iter_mut().enumerate().take(LIMBS - limb_shift) {
            let src = i + limb_shift;
            *slot = self.0[src] >> bit_shift;
            if bit_shift > 0 && src + 1 < LIMBS {
                *slot |= self.0[src + 1] << (64 - bit_shift);
            }
        }
        Word(out)
    }
}

impl BitAnd for Word {
    type Output = Word;

    fn bitand(self, rhs: Word) -> Word {
        let mut out = self.0;
        for (slot, r) in out.iter_mut().zip(rhs.0) {
            *slot &= r;
        }
        Word(out)
    }
}

impl BitOr for Word {
    type Output = Word;

    fn bitor(self, rhs: Word) -> Word {
        let mut out = self.0;
        for (slot, r) in out.iter_mut().zip(rhs.0) {
            *slot |= r;
        }
        Word(out)
    }
}

// ============================================================================
// Conversions and formatting
// ============================================================================

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Word::from_u64(value)
    }
}

impl From<u128> for Word {
    fn from(value: u128) -> Self {
        Word([value as u64, (value >> 64) as u64, 0, 0])
    }
}

impl From<bool> for Word {
    fn from(value: bool) -> Self {
        if value {
            Word::ONE
        } else {
            Word::ZERO
        }
    }
}

impl From<usize> for Word {
    fn from(value: usize) -> Self {
        Word::from_u64(value as u64)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.pad("0");
        }
        // Peel off 19 decimal digits at a time (largest power of ten in a u64).
        const CHUNK: u64 = 10_000_000_000_000_000_000;
        let mut chunks = Vec::new();
        let mut rest = *self;
        while !rest.is_zero() {
            let (q, r) = rest.div_rem_u64(CHUNK);
            chunks.push(r);
            rest = q;
        }
        let mut digits = String::new();
        for (i, chunk) in chunks.iter().rev().enumerate() {
            if i == 0 {
                digits.push_str(&chunk.to_string());
            } else {
                digits.push_str(&format!("{:019}", chunk));
            }
        }
        f.pad(&digits)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({})", self)
    }
}

impl fmt::LowerHex for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut digits = String::new();
        for limb in self.0.iter().rev() {
            if digits.is_empty() {
                if *limb != 0 {
                    digits.push_str(&format!("{:x}", limb));
                }
            } else {
                digits.push_str(&format!("{:016x}", limb));
            }
        }
        if digits.is_empty() {
            digits.push('0');
        }
        if f.alternate() {
            f.pad(&format!("0x{}", digits))
        } else {
            f.pad(&digits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn w(v: u128) -> Word {
        Word::from(v)
    }

    #[test]
    fn test_add_carries_across_limbs() {
        let a = Word::from(u64::MAX);
        assert_eq!(a.checked_add(Word::ONE), Some(w(1u128 << 64)));
        assert_eq!(Word::MAX.checked_add(Word::ONE), None);
    }

    #[test]
    fn test_sub_underflow() {
        assert_eq!(w(10).checked_sub(w(3)), Some(w(7)));
        assert_eq!(w(3).checked_sub(w(10)), None);
        assert_eq!(Word::ZERO.wrapping_sub(Word::ONE), Word::MAX);
    }

    #[test]
    fn test_mul_overflow() {
        let big = Word::ONE << 200;
        assert_eq!(big.checked_mul(Word::from(2u64)), Some(Word::ONE << 201));
        assert_eq!(big.checked_mul(big), None);
    }

    #[test]
    fn test_div_rem() {
        assert_eq!(w(13).div_rem(w(2)), Some((w(6), w(1))));
        assert_eq!(w(13).div_rem(Word::ZERO), None);
        let huge = Word::MAX;
        let (q, r) = huge.div_rem(Word::from(u64::MAX)).unwrap();
        assert_eq!(q.checked_mul(Word::from(u64::MAX)).unwrap().checked_add(r), Some(huge));
    }

    #[test]
    fn test_pow() {
        assert_eq!(w(2).checked_pow(w(10)), Some(w(1024)));
        assert_eq!(w(7).checked_pow(Word::ZERO), Some(Word::ONE));
        assert_eq!(w(2).checked_pow(w(255)), Some(Word::ONE << 255));
        assert_eq!(w(2).checked_pow(w(256)), None);
        assert_eq!(Word::ONE.checked_pow(Word::MAX), Some(Word::ONE));
    }

    #[test]
    fn test_shifts_and_masks() {
        let x = w(0xABCD) << 100;
        assert_eq!(x >> 100, w(0xABCD));
        assert_eq!(x >> 300, Word::ZERO);
        assert_eq!((x >> 96).low_bits(8), w(0xD0));
        assert_eq!(Word::MAX.low_bits(256), Word::MAX);
        assert_eq!(Word::MAX.low_bits(4), w(0xF));
    }

    #[test]
    fn test_ordering_uses_high_limbs_first() {
        assert!(Word::ONE << 64 > Word::from(u64::MAX));
        assert!(Word::MAX > Word::ONE << 255);
    }

    #[test]
    fn test_display() {
        assert_eq!(Word::ZERO.to_string(), "0");
        assert_eq!(w(640).to_string(), "640");
        assert_eq!(
            Word::MAX.to_string(),
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(format!("{:#x}", w(0xff) << 64), "0xff0000000000000000");
    }

    #[test]
    fn test_byte_round_trip() {
        let x = (w(0x0102) << 200) | w(0x0304);
        let bytes = x.to_be_bytes();
        assert_eq!(bytes[31], 0x04);
        assert_eq!(Word::from_be_bytes(bytes), x);
    }

    proptest! {
        #[test]
        fn prop_arithmetic_matches_u128(a in any::<u64>(), b in any::<u64>()) {
            let (wa, wb) = (Word::from(a), Word::from(b));
            prop_assert_eq!(wa.checked_add(wb), Some(w(u128::from(a) + u128::from(b))));
            prop_assert_eq!(wa.checked_mul(wb), Some(w(u128::from(a) * u128::from(b))));
            if b != 0 {
                prop_assert_eq!(wa.checked_div(wb), Some(Word::from(a / b)));
                prop_assert_eq!(wa.checked_rem(wb), Some(Word::from(a % b)));
            }
            prop_assert_eq!(wa.cmp(&wb), a.cmp(&b));
        }

        #[test]
        fn prop_div_rem_reconstructs(hi in any::<u128>(), lo in any::<u128>(), d in 1u128..=u128::MAX) {
            let n = (w(hi) << 128) | w(lo);
            let (q, r) = n.div_rem(w(d)).unwrap();
            prop_assert!(r < w(d));
            prop_assert_eq!(q.checked_mul(w(d)).and_then(|p| p.checked_add(r)), Some(n));
        }
    }
}
