//! Untyped literal values carried by constant graph nodes.
//!
//! A [`Value`] captures client data before (or instead of) columnar
//! materialization: scalar constants, asset references, and nested
//! lists/dicts. [`Value::ty`] infers the structural [`Type`] used for graph
//! construction; callers that need a different logical type (say, a wider
//! optional) annotate the node explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ArtifactId, DictField, Type, TypedDict};

/// Reference to an asset: a path inside a stored artifact.
///
/// The artifact id is a lookup key, not a pointer; the bytes behind it are
/// resolved through the artifact store at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub artifact: ArtifactId,
    pub path: String,
}

impl AssetRef {
    pub fn new(artifact: ArtifactId, path: impl Into<String>) -> Self {
        Self {
            artifact,
            path: path.into(),
        }
    }
}

/// A literal value that has not been lowered to a columnar array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Asset(AssetRef),
    List(Vec<Value>),
    Dict(Vec<(String, Value)>),
}

macro_rules! impl_from_for_value {
    ($variant:ident, $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_value!(Int, i8, i16, i32, i64);
impl_from_for_value!(Float, f32, f64);
impl_from_for_value!(Bool, bool);
impl_from_for_value!(Text, String);
impl_from_for_value!(Asset, AssetRef);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl Value {
    /// Infer the structural type of this value.
    ///
    /// List element types are the de-duplicated union of member types; an
    /// empty list infers `List<Any>` (nothing constrains the element).
    pub fn ty(&self) -> Type {
        match self {
            Value::Null => Type::None,
            Value::Bool(_) => Type::BOOL,
            Value::Int(_) => Type::INT,
            Value::Float(_) => Type::FLOAT,
            Value::Text(_) => Type::TEXT,
            Value::Bytes(_) => Type::BYTES,
            Value::Asset(_) => Type::ASSET,
            Value::List(items) => {
                if items.is_empty() {
                    Type::list(Type::Any)
                } else {
                    Type::list(Type::union(items.iter().map(Value::ty)))
                }
            }
            Value::Dict(fields) => Type::TypedDict(TypedDict::new(
                fields
                    .iter()
                    .map(|(name, v)| DictField {
                        name: name.clone(),
                        ty: v.ty(),
                    })
                    .collect(),
            )),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short kind name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Asset(_) => "asset",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Asset(a) => write!(f, "<asset {} {}>", a.artifact, a.path),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Dict(fields) => {
                write!(f, "{{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}
