//! The structural type system of the graph.
//!
//! Types are immutable values with structural equality: two
//! independently built `Type::Bits(32)` instances always compare equal.
//! Values are cheap to clone and are shared by cloning; no interner is
//! exposed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width classes for floating point values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatSize {
    Half,
    Fp32,
    Fp64,
    X86Fp80,
    Fp128,
}

/// A value, state or control type carried by a port.
///
/// `Control(k)` tokens select one of `k` alternatives and drive γ
/// predicates (and, with `k = 2`, θ continuation). The three state
/// variants carry no data; they exist solely to serialize side effects
/// along explicit edges.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bits(u32),
    Float(FloatSize),
    Control(u32),
    IoState,
    MemoryState,
    LoopState,
    Pointer,
    Array { element: Box<Type>, length: u64 },
    Record { fields: Vec<Type> },
    Function { arguments: Vec<Type>, results: Vec<Type> },
}

impl Type {
    /// Whether this is one of the state token types.
    pub fn is_state(&self) -> bool {
        matches!(self, Type::IoState | Type::MemoryState | Type::LoopState)
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Type::Control(_))
    }

    /// Whether this type carries an ordinary value (not state, not control).
    pub fn is_value(&self) -> bool {
        !self.is_state() && !self.is_control()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bits(width) => write!(f, "bit{}", width),
            Type::Float(FloatSize::Half) => write!(f, "f16"),
            Type::Float(FloatSize::Fp32) => write!(f, "f32"),
            Type::Float(FloatSize::Fp64) => write!(f, "f64"),
            Type::Float(FloatSize::X86Fp80) => write!(f, "f80"),
            Type::Float(FloatSize::Fp128) => write!(f, "f128"),
            Type::Control(n) => write!(f, "ctl{}", n),
            Type::IoState => write!(f, "io"),
            Type::MemoryState => write!(f, "mem"),
            Type::LoopState => write!(f, "loop"),
            Type::Pointer => write!(f, "ptr"),
            Type::Array { element, length } => write!(f, "[{} x {}]", length, element),
            Type::Record { fields } => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
            Type::Function { arguments, results } => {
                write!(f, "fn(")?;
                for (i, ty) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, ") -> (")?;
                for (i, ty) in results.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, ")")
            }
        }
    }
}
