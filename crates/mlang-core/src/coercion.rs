//! Structural coercion.
//!
//! [`coerce`] decides whether a value of one type may be used where another
//! is expected. Instead of a yes/no answer it returns a [`Coercion`] plan
//! describing how to transform the value. Plans are also the serialization
//! codes handed to the runtime value library; [`serialization_code`] builds
//! the identity plan of a type.
//!
//! ## Rule order
//!
//! Checked after stripping `init` wrappers from both sides:
//! 1. Union source (every arm must coerce)
//! 2. Union target (first admitting arm, in declaration order)
//! 3. Numeric ladder (`bool` < `bounded_int` < `int` < `real`)
//! 4. `char`, `enum` (same alias)
//! 5. Containers: tuple, array, list, map, struct (width subtyping)
//!
//! Resolved pairings covered by a rule but incompatible have no coercion. An
//! array source against anything but an array, a list or a union has no rule
//! at all and is a [`TypeError::UnhandledPairing`]. Pairings that still
//! contain an alias reference or a symbolic bound are reported as
//! [`TypeError::Unsupported`].

use std::fmt;

use crate::error::TypeError;
use crate::type_tree::{Bound, TypeTree};

/// How to transform a value of one type into another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Coercion {
    /// The value is used as is.
    Direct,
    /// Integer range check against `[l, r]`.
    Bounded { l: i64, r: i64 },
    /// Component-wise.
    Tuple(Vec<Coercion>),
    /// Re-export of an already tagged value: one plan per source arm.
    Union(Vec<Coercion>),
    /// Element-wise, into an array of declared length `length`.
    Array {
        length: usize,
        element: Box<Coercion>,
    },
    List(Box<Coercion>),
    Map {
        key: Box<Coercion>,
        value: Box<Coercion>,
    },
    /// One plan per target field; source fields not listed are dropped.
    Struct(Vec<(String, Coercion)>),
    /// Injection into arm `index` of a union.
    Inj { index: usize, inner: Box<Coercion> },
}

impl Coercion {
    pub fn is_direct(&self) -> bool {
        matches!(self, Coercion::Direct)
    }

    /// Apply this plan to an integer known at compile time.
    ///
    /// Only numeric plans are meaningful here; anything else is accepted.
    pub fn check_static(&self, value: i64) -> Result<(), TypeError> {
        match self {
            Coercion::Bounded { l, r } if value < *l || value > *r => Err(TypeError::OutOfBounds {
                value,
                l: *l,
                r: *r,
            }),
            Coercion::Inj { inner, .. } => inner.check_static(value),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, items: &[Coercion]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            Coercion::Direct => write!(f, "direct"),
            Coercion::Bounded { l, r } => write!(f, "bounded({l}, {r})"),
            Coercion::Tuple(plans) => {
                write!(f, "tuple(")?;
                list(f, plans)?;
                write!(f, ")")
            }
            Coercion::Union(plans) => {
                write!(f, "union(")?;
                list(f, plans)?;
                write!(f, ")")
            }
            Coercion::Array { length, element } => write!(f, "array({length}, {element})"),
            Coercion::List(element) => write!(f, "list({element})"),
            Coercion::Map { key, value } => write!(f, "map({key}, {value})"),
            Coercion::Struct(fields) => {
                write!(f, "struct(")?;
                for (i, (name, plan)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {plan}")?;
                }
                write!(f, ")")
            }
            Coercion::Inj { index, inner } => write!(f, "inj({index}, {inner})"),
        }
    }
}

// ============================================================================
// Coercion search
// ============================================================================

fn unsupported(from: &TypeTree, to: &TypeTree) -> TypeError {
    TypeError::Unsupported {
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn literal_bounds(ty: &TypeTree, l: &Bound, r: &Bound, other: &TypeTree) -> Result<(i64, i64), TypeError> {
    match (l.literal(), r.literal()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(unsupported(ty, other)),
    }
}

fn literal_length(ty: &TypeTree, length: &Bound, other: &TypeTree) -> Result<usize, TypeError> {
    length
        .literal()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| unsupported(ty, other))
}

/// Find the coercion plan from `from` to `to`.
///
/// `Ok(None)` means the types are well formed but incompatible.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn coerce(from: &TypeTree, to: &TypeTree) -> Result<Option<Coercion>, TypeError> {
    use TypeTree as T;

    let from = from.strip_init();
    let to = to.strip_init();

    match (from, to) {
        (T::Named(_), _) | (_, T::Named(_)) => Err(unsupported(from, to)),

        (T::Union(arms), _) => {
            let mut plans = Vec::with_capacity(arms.len());
            for arm in arms.iter() {
                match coerce(arm, to)? {
                    Some(plan) => plans.push(plan),
                    None => return Ok(None),
                }
            }
            Ok(Some(Coercion::Union(plans)))
        }

        (_, T::Union(arms)) => {
            for (index, arm) in arms.iter().enumerate() {
                let inner = match coerce(from, arm) {
                    Ok(Some(inner)) => inner,
                    Ok(None) | Err(TypeError::UnhandledPairing { .. }) => continue,
                    Err(err) => return Err(err),
                };
                return Ok(Some(Coercion::Inj {
                    index,
                    inner: Box::new(inner),
                }));
            }
            Ok(None)
        }

        // Numeric ladder
        (T::Int, T::Int) | (T::Int, T::Real) => Ok(Some(Coercion::Direct)),
        (T::Int, T::BoundedInt { l, r }) => {
            let (l, r) = literal_bounds(to, l, r, from)?;
            Ok(Some(Coercion::Bounded { l, r }))
        }
        (T::BoundedInt { l: sl, r: sr }, T::BoundedInt { l, r }) => {
            literal_bounds(from, sl, sr, to)?;
            let (l, r) = literal_bounds(to, l, r, from)?;
            Ok(Some(Coercion::Bounded { l, r }))
        }
        (T::BoundedInt { l, r }, T::Int | T::Real) => {
            literal_bounds(from, l, r, to)?;
            Ok(Some(Coercion::Direct))
        }
        (T::Bool, T::BoundedInt { l, r }) => {
            literal_bounds(to, l, r, from)?;
            Ok(Some(Coercion::Direct))
        }
        (T::Bool, T::Int | T::Real | T::Bool) => Ok(Some(Coercion::Direct)),
        (T::Real, T::Real) => Ok(Some(Coercion::Direct)),
        (T::Int | T::BoundedInt { .. } | T::Real | T::Bool, _) => Ok(None),

        (T::Char, T::Char) => Ok(Some(Coercion::Direct)),
        (T::Enum(a), T::Enum(b)) => Ok((a == b).then_some(Coercion::Direct)),
        (T::Char | T::Enum(_), _) => Ok(None),

        (T::Tuple(a), T::Tuple(b)) => {
            if a.len() != b.len() {
                return Ok(None);
            }
            let mut plans = Vec::with_capacity(a.len());
            for (x, y) in a.iter().zip(b.iter()) {
                match coerce(x, y)? {
                    Some(plan) => plans.push(plan),
                    None => return Ok(None),
                }
            }
            Ok(Some(Coercion::Tuple(plans)))
        }
        (T::Tuple(_), _) => Ok(None),

        (
            T::Array {
                length: n,
                element: e1,
            },
            T::Array {
                length: m,
                element: e2,
            },
        ) => {
            let n = literal_length(from, n, to)?;
            let m = literal_length(to, m, from)?;
            if m < n {
                return Ok(None);
            }
            Ok(coerce(e1, e2)?.map(|element| Coercion::Array {
                length: m,
                element: Box::new(element),
            }))
        }
        (T::Array { length, element }, T::List(target)) => {
            literal_length(from, length, to)?;
            Ok(coerce(element, target)?.map(|e| Coercion::List(Box::new(e))))
        }
        (T::Array { .. }, _) => Err(TypeError::UnhandledPairing {
            from: from.to_string(),
            to: to.to_string(),
        }),
        (T::List(source), T::List(target)) => {
            Ok(coerce(source, target)?.map(|e| Coercion::List(Box::new(e))))
        }
        (T::List(_), _) => Ok(None),

        (T::Map { key: k1, value: v1 }, T::Map { key: k2, value: v2 }) => {
            let Some(key) = coerce(k1, k2)? else {
                return Ok(None);
            };
            let Some(value) = coerce(v1, v2)? else {
                return Ok(None);
            };
            Ok(Some(Coercion::Map {
                key: Box::new(key),
                value: Box::new(value),
            }))
        }
        (T::Map { .. }, _) => Ok(None),

        (T::Struct(source), T::Struct(target)) => {
            let mut plans = Vec::with_capacity(target.len());
            for field in target.iter() {
                let Some(have) = source.iter().find(|f| f.name == field.name) else {
                    return Ok(None);
                };
                match coerce(&have.ty, &field.ty)? {
                    Some(plan) => plans.push((field.name.clone(), plan)),
                    None => return Ok(None),
                }
            }
            Ok(Some(Coercion::Struct(plans)))
        }
        (T::Struct(_), _) => Ok(None),

        (T::Init { .. }, _) => Err(unsupported(from, to)),
    }
}

/// Like [`coerce`], but a missing plan is a [`TypeError::NoCoercion`].
pub fn require_coercion(from: &TypeTree, to: &TypeTree) -> Result<Coercion, TypeError> {
    coerce(from, to)?.ok_or_else(|| TypeError::NoCoercion {
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// `from <= to`: a coercion plan exists.
pub fn is_subtype(from: &TypeTree, to: &TypeTree) -> Result<bool, TypeError> {
    Ok(coerce(from, to)?.is_some())
}

/// `a >= b`.
pub fn is_supertype(a: &TypeTree, b: &TypeTree) -> Result<bool, TypeError> {
    is_subtype(b, a)
}

/// The serialization code of a type.
///
/// This is the identity plan: every union arm is re-tagged with its own
/// label, which the reflexive plan from [`coerce`] does not guarantee when an
/// earlier arm also admits a later one.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn serialization_code(ty: &TypeTree) -> Result<Coercion, TypeError> {
    use TypeTree as T;

    let ty = ty.strip_init();
    match ty {
        T::Named(_) | T::Init { .. } => Err(unsupported(ty, ty)),
        T::Int | T::Real | T::Bool | T::Char | T::Enum(_) => Ok(Coercion::Direct),
        T::BoundedInt { l, r } => {
            let (l, r) = literal_bounds(ty, l, r, ty)?;
            Ok(Coercion::Bounded { l, r })
        }
        T::Tuple(items) => items
            .iter()
            .map(serialization_code)
            .collect::<Result<_, _>>()
            .map(Coercion::Tuple),
        T::Union(arms) => arms
            .iter()
            .enumerate()
            .map(|(index, arm)| {
                Ok(Coercion::Inj {
                    index,
                    inner: Box::new(serialization_code(arm)?),
                })
            })
            .collect::<Result<_, _>>()
            .map(Coercion::Union),
        T::Array { length, element } => Ok(Coercion::Array {
            length: literal_length(ty, length, ty)?,
            element: Box::new(serialization_code(element)?),
        }),
        T::List(element) => Ok(Coercion::List(Box::new(serialization_code(element)?))),
        T::Map { key, value } => Ok(Coercion::Map {
            key: Box::new(serialization_code(key)?),
            value: Box::new(serialization_code(value)?),
        }),
        T::Struct(fields) => fields
            .iter()
            .map(|field| Ok((field.name.clone(), serialization_code(&field.ty)?)))
            .collect::<Result<_, _>>()
            .map(Coercion::Struct),
    }
}
