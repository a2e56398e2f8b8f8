//! # Value Type System
//!
//! Core value types: totally ordered atoms (Int64, String, Id) and
//! arbitrary-arity tuples with a canonical, order-preserving byte encoding.
//!
//! The tries index tuples by atom order and the witness table keys output
//! tuples by their encoding, so both rely on the same guarantees:
//!
//! - `Ord` on [`Atom`] is a total order, and the byte encoding preserves it:
//!   `a < b` iff `a.to_bytes() < b.to_bytes()`.
//! - Encodings are prefix-free across variants, so equality by bytes
//!   coincides with structural equality.
//! - Distinct tuples never share an encoding (the arity is part of it).
//!
//! ## Usage
//!
//! ```rust
//! use deltaleap::value::{Atom, Tuple};
//!
//! let order = Tuple::new(vec![
//!     Atom::id("o1"),
//!     Atom::id("u1"),
//!     Atom::Int(100),
//! ]);
//! assert_eq!(order.arity(), 3);
//! assert_eq!(order.get(2), Some(&Atom::Int(100)));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Variant tags, in cross-variant order: Int < Str < Id.
const TAG_INT: u8 = 0x01;
const TAG_STR: u8 = 0x02;
const TAG_ID: u8 = 0x03;

/// A single totally ordered value cell.
///
/// `Str` and `Id` carry `Arc<str>` payloads so clones inside probe loops are
/// cheap. `Id` is an opaque identifier: it never compares equal to a `Str`
/// with the same characters, and sorts after every `Str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Atom {
    /// Signed 64-bit integer
    Int(i64),
    /// Unicode string, compared by code-point order
    Str(Arc<str>),
    /// Opaque identifier, compared lexicographically over its bytes
    Id(Arc<str>),
}

impl Atom {
    /// Build a string atom.
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Atom::Str(s.into())
    }

    /// Build an id atom.
    pub fn id(s: impl Into<Arc<str>>) -> Self {
        Atom::Id(s.into())
    }

    /// Rank used for the fixed cross-variant order.
    fn rank(&self) -> u8 {
        match self {
            Atom::Int(_) => TAG_INT,
            Atom::Str(_) => TAG_STR,
            Atom::Id(_) => TAG_ID,
        }
    }

    /// Append the canonical encoding of this atom to `out`.
    ///
    /// One tag byte, then an order-preserving payload: integers as big-endian
    /// bytes with the sign bit flipped; strings and ids as UTF-8 with `0x00`
    /// escaped to `0x00 0xFF` and a `0x00 0x00` terminator. The terminator
    /// keeps the encoding prefix-free, so tuple encodings never collide.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        out.push(self.rank());
        match self {
            Atom::Int(v) => {
                out.extend_from_slice(&((*v as u64) ^ (1 << 63)).to_be_bytes());
            }
            Atom::Str(s) | Atom::Id(s) => {
                for &b in s.as_bytes() {
                    if b == 0x00 {
                        out.push(0x00);
                        out.push(0xFF);
                    } else {
                        out.push(b);
                    }
                }
                out.push(0x00);
                out.push(0x00);
            }
        }
    }

    /// Canonical byte encoding of this atom.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9);
        self.write_bytes(&mut out);
        out
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Atom::Int(a), Atom::Int(b)) => a.cmp(b),
            (Atom::Str(a), Atom::Str(b)) => a.cmp(b),
            (Atom::Id(a), Atom::Id(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(v) => write!(f, "{v}"),
            Atom::Str(s) => write!(f, "{s:?}"),
            Atom::Id(s) => write!(f, "#{s}"),
        }
    }
}

/// An immutable fixed-arity sequence of atoms.
///
/// Backed by `Arc<[Atom]>`: tuples flow through deltas, tries and the
/// witness table, and cloning must stay O(1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tuple {
    atoms: Arc<[Atom]>,
}

impl Tuple {
    /// Build a tuple from its atoms.
    pub fn new(atoms: Vec<Atom>) -> Self {
        Tuple {
            atoms: atoms.into(),
        }
    }

    /// The empty prefix (arity 0).
    pub fn empty() -> Self {
        Tuple::new(Vec::new())
    }

    /// Number of atoms.
    pub fn arity(&self) -> usize {
        self.atoms.len()
    }

    /// Atom at position `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    /// All atoms in position order.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Canonical byte encoding: big-endian `u16` arity followed by the
    /// concatenated atom encodings. Distinct tuples never share bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 9 * self.atoms.len());
        out.extend_from_slice(&(self.atoms.len() as u16).to_be_bytes());
        for atom in self.atoms.iter() {
            atom.write_bytes(&mut out);
        }
        out
    }
}

impl std::ops::Index<usize> for Tuple {
    type Output = Atom;

    fn index(&self, index: usize) -> &Atom {
        &self.atoms[index]
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{atom}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_variant_order() {
        let int = Atom::Int(i64::MAX);
        let s = Atom::str("");
        let id = Atom::id("");
        assert!(int < s);
        assert!(s < id);
        assert!(int < id);
    }

    #[test]
    fn test_str_and_id_never_equal() {
        assert_ne!(Atom::str("u1"), Atom::id("u1"));
        assert!(Atom::str("zzz") < Atom::id("aaa"));
    }

    #[test]
    fn test_int_encoding_preserves_order() {
        let values = [i64::MIN, -100, -1, 0, 1, 42, i64::MAX];
        for w in values.windows(2) {
            let (a, b) = (Atom::Int(w[0]), Atom::Int(w[1]));
            assert!(a.to_bytes() < b.to_bytes(), "{a} !< {b} in bytes");
        }
    }

    #[test]
    fn test_str_encoding_preserves_order() {
        // Embedded NUL and prefix relationships are the tricky cases for the
        // escape encoding.
        let values = ["", "a", "a\0", "a\0b", "ab", "b", "ba"];
        for w in values.windows(2) {
            assert!(w[0] < w[1]);
            let (a, b) = (Atom::str(w[0]), Atom::str(w[1]));
            assert!(a.to_bytes() < b.to_bytes(), "{a} !< {b} in bytes");
        }
    }

    #[test]
    fn test_encoding_matches_cmp() {
        let atoms = [
            Atom::Int(-5),
            Atom::Int(3),
            Atom::str("abc"),
            Atom::str("abd"),
            Atom::id("a"),
            Atom::id("ab"),
        ];
        for a in &atoms {
            for b in &atoms {
                assert_eq!(a.cmp(b), a.to_bytes().cmp(&b.to_bytes()));
            }
        }
    }

    #[test]
    fn test_tuple_order_is_lexicographic() {
        let t1 = Tuple::new(vec![Atom::Int(1)]);
        let t12 = Tuple::new(vec![Atom::Int(1), Atom::Int(2)]);
        let t2 = Tuple::new(vec![Atom::Int(2)]);
        assert!(t1 < t12);
        assert!(t12 < t2);
        assert!(Tuple::empty() < t1);
    }

    #[test]
    fn test_tuple_bytes_distinct() {
        // Same atom stream, different grouping into tuples.
        let flat = Tuple::new(vec![Atom::Int(1), Atom::Int(2)]);
        let one = Tuple::new(vec![Atom::Int(1)]);
        assert_ne!(flat.to_bytes(), one.to_bytes());
        assert_ne!(Tuple::empty().to_bytes(), one.to_bytes());
    }

    #[test]
    fn test_tuple_access() {
        let t = Tuple::new(vec![Atom::id("u1"), Atom::str("Alice")]);
        assert_eq!(t.arity(), 2);
        assert_eq!(t.get(0), Some(&Atom::id("u1")));
        assert_eq!(t.get(2), None);
        assert_eq!(t[1], Atom::str("Alice"));
    }

    #[test]
    fn test_display() {
        let t = Tuple::new(vec![Atom::id("u1"), Atom::str("Alice"), Atom::Int(3)]);
        assert_eq!(t.to_string(), "(#u1, \"Alice\", 3)");
    }

    #[test]
    fn test_serde_round_trip() {
        let t = Tuple::new(vec![Atom::Int(7), Atom::str("x"), Atom::id("n1")]);
        let json = serde_json::to_string(&t).unwrap();
        let back: Tuple = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
