//! Structural type descriptors and the assignability relation for lace.
//!
//! A [`Type`] describes the shape of a value: primitives, ordered typed
//! dictionaries, lists, unions, and domain types (currently the asset type
//! for opaque media carrying a content hash). Types drive operation dispatch
//! at graph-construction time and the comparison-safety rewrite; they never
//! touch data themselves.
//!
//! The variant set is closed on purpose: every dispatch site matches
//! exhaustively, so adding a variant forces each site to be revisited.
//!
//! # Assignability
//!
//! [`Type::assign_type`] answers "can a value of `candidate` be used wherever
//! `self` is expected". It is a partial order: reflexive, transitive,
//! covariant for containers, with unions distributing over members on the
//! candidate side. Optionality is spelled `Union[None, T]` and is never
//! stripped implicitly; callers use [`non_none`] before structural matching.

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields};
use serde::{Deserialize, Serialize};

pub mod ids;
pub mod value;

pub use ids::ArtifactId;
pub use value::{AssetRef, Value};

/// Primitive scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Primitive {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
}

/// Domain types: opaque values with engine-defined semantics.
///
/// `Asset` stands for media stored in an artifact; it is not comparable by
/// raw equality and is rewritten to its content hash before use as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    Asset,
}

/// One declared field of a [`TypedDict`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictField {
    pub name: String,
    pub ty: Type,
}

/// An ordered mapping of field name to type.
///
/// Equality is field-order-sensitive (two dicts with the same fields in a
/// different order are different types); assignability looks fields up by
/// name and ignores extra candidate fields (structural width subtyping).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypedDict {
    pub fields: Vec<DictField>,
}

impl TypedDict {
    pub fn new(fields: Vec<DictField>) -> Self {
        Self { fields }
    }

    /// Look up a declared field's type by name.
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Structural type descriptor.
///
/// `Any` is the top type used by operation signatures: every type is
/// assignable to an `Any` target, while `Any` as a candidate fits only an
/// `Any` target. `None` is the unit type of the null value; optional types
/// are unions containing `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Any,
    None,
    Primitive(Primitive),
    TypedDict(TypedDict),
    List(Box<Type>),
    Union(Vec<Type>),
    Domain(Domain),
}

impl Type {
    pub const BOOL: Type = Type::Primitive(Primitive::Bool);
    pub const INT: Type = Type::Primitive(Primitive::Int);
    pub const FLOAT: Type = Type::Primitive(Primitive::Float);
    pub const TEXT: Type = Type::Primitive(Primitive::Text);
    pub const BYTES: Type = Type::Primitive(Primitive::Bytes);
    pub const ASSET: Type = Type::Domain(Domain::Asset);

    /// A list of `elem`.
    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    /// A typed dict from `(name, type)` pairs, preserving order.
    pub fn typed_dict<N: Into<String>>(fields: impl IntoIterator<Item = (N, Type)>) -> Type {
        Type::TypedDict(TypedDict::new(
            fields
                .into_iter()
                .map(|(name, ty)| DictField {
                    name: name.into(),
                    ty,
                })
                .collect(),
        ))
    }

    /// A union of `members`, flattening nested unions and de-duplicating.
    /// Collapses to the single member when only one distinct type remains.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        for member in members {
            match member {
                Type::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => Type::None,
            1 => flat.into_iter().next().expect("len checked"),
            _ => Type::Union(flat),
        }
    }

    /// `Union[None, inner]`; returns `inner` unchanged when already optional.
    pub fn optional(inner: Type) -> Type {
        if inner.is_optional() {
            return inner;
        }
        Type::union([Type::None, inner])
    }

    /// True when this type admits the null value (`None` itself, a union
    /// containing `None`, or `Any`).
    pub fn is_optional(&self) -> bool {
        match self {
            Type::None | Type::Any => true,
            Type::Union(members) => members.iter().any(|m| matches!(m, Type::None)),
            _ => false,
        }
    }

    /// `assign_type(target, candidate)`: can a value of `candidate` be used
    /// wherever `self` (the target) is expected.
    ///
    /// Pure; returns `false` on mismatch rather than erroring. Candidate
    /// unions are checked before target unions: a union fits only when every
    /// member does.
    pub fn assign_type(&self, candidate: &Type) -> bool {
        // Union on the candidate side distributes over members.
        if let Type::Union(members) = candidate {
            return members.iter().all(|m| self.assign_type(m));
        }
        match (self, candidate) {
            (Type::Any, _) => true,
            (_, Type::Any) => false,
            (Type::None, Type::None) => true,
            (Type::Primitive(t), Type::Primitive(c)) => {
                t == c || (*t == Primitive::Float && *c == Primitive::Int)
            }
            (Type::TypedDict(t), Type::TypedDict(c)) => t.fields.iter().all(|tf| {
                c.field(&tf.name)
                    .is_some_and(|cf_ty| tf.ty.assign_type(cf_ty))
            }),
            (Type::List(t), Type::List(c)) => t.assign_type(c),
            (Type::Union(members), _) => members.iter().any(|m| m.assign_type(candidate)),
            (Type::Domain(t), Type::Domain(c)) => t == c,
            _ => false,
        }
    }

    /// The Arrow physical encoding for this logical type, or `None` when the
    /// type has no single encoding (general unions, `Any`).
    ///
    /// Optional types encode as their `non_none` form: nullness lives in the
    /// array's validity bitmap, not in the data type.
    pub fn arrow_type(&self) -> Option<DataType> {
        match self {
            Type::Any => None,
            Type::None => Some(DataType::Null),
            Type::Primitive(p) => Some(match p {
                Primitive::Bool => DataType::Boolean,
                Primitive::Int => DataType::Int64,
                Primitive::Float => DataType::Float64,
                Primitive::Text => DataType::Utf8,
                Primitive::Bytes => DataType::Binary,
            }),
            Type::TypedDict(dict) => {
                let mut fields = Vec::with_capacity(dict.fields.len());
                for f in &dict.fields {
                    let child = f.ty.arrow_type()?;
                    fields.push(Field::new(&f.name, child, f.ty.is_optional()));
                }
                Some(DataType::Struct(Fields::from(fields)))
            }
            Type::List(elem) => {
                let child = elem.arrow_type()?;
                Some(DataType::List(Arc::new(Field::new(
                    "item",
                    child,
                    elem.is_optional(),
                ))))
            }
            Type::Union(_) => {
                if self.is_optional() {
                    non_none(self).arrow_type()
                } else {
                    None
                }
            }
            Type::Domain(Domain::Asset) => Some(DataType::Struct(asset_struct_fields())),
        }
    }

    /// Best-effort logical type for a physical Arrow encoding.
    ///
    /// Structs always map to typed dicts: the asset type cannot be
    /// recovered from its physical layout and must come from the logical
    /// side. Never produces `Union` or `Any`.
    pub fn from_arrow(dt: &DataType) -> Option<Type> {
        match dt {
            DataType::Null => Some(Type::None),
            DataType::Boolean => Some(Type::BOOL),
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                Some(Type::INT)
            }
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                Some(Type::INT)
            }
            DataType::Float32 | DataType::Float64 => Some(Type::FLOAT),
            DataType::Utf8 | DataType::LargeUtf8 => Some(Type::TEXT),
            DataType::Binary | DataType::LargeBinary => Some(Type::BYTES),
            DataType::Struct(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for f in fields {
                    let mut child = Type::from_arrow(f.data_type())?;
                    if f.is_nullable() {
                        child = Type::optional(child);
                    }
                    out.push(DictField {
                        name: f.name().clone(),
                        ty: child,
                    });
                }
                Some(Type::TypedDict(TypedDict::new(out)))
            }
            DataType::List(field) | DataType::LargeList(field) => {
                let mut elem = Type::from_arrow(field.data_type())?;
                if field.is_nullable() {
                    elem = Type::optional(elem);
                }
                Some(Type::list(elem))
            }
            DataType::Dictionary(_, values) => Type::from_arrow(values),
            _ => None,
        }
    }
}

/// Strip `None` members from a union, collapsing singleton unions.
///
/// `non_none(None)` is `None`, there being nothing left to strip. Non-union
/// types pass through unchanged; assignability never strips optionality
/// implicitly, so call this explicitly before structural matching.
pub fn non_none(ty: &Type) -> Type {
    match ty {
        Type::Union(members) => {
            let kept: Vec<Type> = members
                .iter()
                .filter(|m| !matches!(m, Type::None))
                .cloned()
                .collect();
            match kept.len() {
                0 => Type::None,
                1 => kept.into_iter().next().expect("len checked"),
                _ => Type::Union(kept),
            }
        }
        other => other.clone(),
    }
}

/// Arrow struct layout backing the asset domain type.
pub fn asset_struct_fields() -> Fields {
    Fields::from(vec![
        Field::new("artifact", DataType::UInt64, false),
        Field::new("path", DataType::Utf8, false),
    ])
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::None => write!(f, "None"),
            Type::Primitive(p) => match p {
                Primitive::Bool => write!(f, "Bool"),
                Primitive::Int => write!(f, "Int"),
                Primitive::Float => write!(f, "Float"),
                Primitive::Text => write!(f, "Text"),
                Primitive::Bytes => write!(f, "Bytes"),
            },
            Type::TypedDict(dict) => {
                write!(f, "{{")?;
                for (i, field) in dict.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
            Type::List(elem) => write!(f, "List<{}>", elem),
            Type::Union(members) => {
                write!(f, "Union<")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", m)?;
                }
                write!(f, ">")
            }
            Type::Domain(Domain::Asset) => write!(f, "Asset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_flattens_and_dedups() {
        let u = Type::union([
            Type::INT,
            Type::union([Type::None, Type::INT]),
            Type::TEXT,
        ]);
        assert_eq!(u, Type::Union(vec![Type::INT, Type::None, Type::TEXT]));
    }

    #[test]
    fn test_optional_is_idempotent() {
        let opt = Type::optional(Type::INT);
        assert!(opt.is_optional());
        assert_eq!(Type::optional(opt.clone()), opt);
    }

    #[test]
    fn test_non_none_strips_only_none() {
        assert_eq!(non_none(&Type::optional(Type::INT)), Type::INT);
        assert_eq!(non_none(&Type::None), Type::None);
        let wide = Type::union([Type::None, Type::INT, Type::TEXT]);
        assert_eq!(non_none(&wide), Type::Union(vec![Type::INT, Type::TEXT]));
    }

    #[test]
    fn test_display_renders_structure() {
        let ty = Type::typed_dict([("a", Type::INT), ("xs", Type::list(Type::TEXT))]);
        assert_eq!(ty.to_string(), "{a: Int, xs: List<Text>}");
        assert_eq!(Type::optional(Type::FLOAT).to_string(), "Union<None, Float>");
    }

    #[test]
    fn test_arrow_type_for_optional_uses_non_none_encoding() {
        assert_eq!(
            Type::optional(Type::INT).arrow_type(),
            Some(DataType::Int64)
        );
        assert_eq!(Type::union([Type::INT, Type::TEXT]).arrow_type(), None);
    }

    #[test]
    fn test_from_arrow_round_trips_struct_shape() {
        let ty = Type::typed_dict([("a", Type::INT), ("b", Type::optional(Type::TEXT))]);
        let dt = ty.arrow_type().expect("struct encodes");
        assert_eq!(Type::from_arrow(&dt), Some(ty));
    }
}
