//! Operation definitions and the typed construction path.
//!
//! Every output node is built by [`OpRegistry::apply`]: the registry looks up
//! the [`OpDef`], checks each input's type against the declared parameter,
//! computes the output type, and only then allocates the node. Malformed
//! graphs fail at construction, never at evaluation.
//!
//! # Null policy
//!
//! Optionality is part of the type (`Union[None, T]`), so signatures declare
//! how an op treats null inputs:
//!
//! - [`NullPolicy::Propagate`]: the op never sees a null. Parameters match
//!   against the input's `non_none` form and the output type becomes optional
//!   when any input was. Most ops use this.
//! - [`NullPolicy::Consume`]: the op takes nulls as data. Inputs match as-is
//!   and the output is whatever the signature declares. The null-safe
//!   comparisons use this; their output carries no nulls at all.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use lace_result::{Error, Result};
use lace_types::{Type, TypedDict, Value, non_none};

use crate::node::{Node, NodeRef};

/// Well-known op names.
pub mod op_names {
    pub const PICK: &str = "pick";
    pub const DICT: &str = "dict";
    pub const JOIN_TO_STR: &str = "join_to_str";
    pub const ASSET_SHA256: &str = "asset_sha256";
    pub const EQ: &str = "eq";
    pub const NE: &str = "ne";
}

/// How an op signature treats null inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    /// Null inputs skip the op and produce null outputs. Parameters match
    /// the input's `non_none` type; the output becomes optional when any
    /// input admits null.
    Propagate,
    /// The op consumes nulls itself; inputs match without adjustment.
    Consume,
}

/// One declared parameter of an op.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub ty: Type,
}

impl Param {
    pub fn new(name: &'static str, ty: Type) -> Self {
        Self { name, ty }
    }
}

/// How the output type of an applied op is determined.
pub enum OutputType {
    /// The op always produces this type (before optional re-wrapping).
    Fixed(Type),
    /// The output type depends on the inputs, e.g. a field projection.
    Infer(fn(&[NodeRef]) -> Result<Type>),
}

/// Declaration of one graph operation: name, signature, output typing,
/// null handling, and whether results may enter the cross-execute cache.
pub struct OpDef {
    name: &'static str,
    params: Vec<Param>,
    variadic: Option<Vec<Param>>,
    output: OutputType,
    null_policy: NullPolicy,
    cacheable: bool,
}

impl OpDef {
    pub fn new(name: &'static str, output: OutputType) -> Self {
        Self {
            name,
            params: Vec::new(),
            variadic: None,
            output,
            null_policy: NullPolicy::Propagate,
            cacheable: false,
        }
    }

    pub fn with_param(mut self, name: &'static str, ty: Type) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    /// Declare a trailing repeated parameter group. Extra inputs beyond the
    /// fixed parameters must arrive in whole multiples of the group.
    pub fn with_variadic_group(mut self, group: Vec<Param>) -> Self {
        debug_assert!(!group.is_empty(), "variadic group must not be empty");
        self.variadic = Some(group);
        self
    }

    pub fn with_null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    /// Mark results of this op as eligible for the cross-execute cache.
    /// Only ops whose output is a pure function of durable inputs (content
    /// hashes, artifact reads) should opt in.
    pub fn with_cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// The declared parameter for input position `index`, resolving variadic
    /// groups. `None` when the position is beyond the signature.
    fn param_at(&self, index: usize) -> Option<&Param> {
        if index < self.params.len() {
            return self.params.get(index);
        }
        let group = self.variadic.as_ref()?;
        group.get((index - self.params.len()) % group.len())
    }

    fn check_arity(&self, supplied: usize) -> Result<()> {
        let fixed = self.params.len();
        match &self.variadic {
            None if supplied != fixed => Err(Error::InvalidArgument(format!(
                "op '{}' takes {} inputs, got {}",
                self.name, fixed, supplied
            ))),
            Some(group)
                if supplied < fixed || (supplied - fixed) % group.len() != 0 =>
            {
                Err(Error::InvalidArgument(format!(
                    "op '{}' takes {} inputs plus groups of {}, got {}",
                    self.name,
                    fixed,
                    group.len(),
                    supplied
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Named collection of [`OpDef`]s; the only typed construction path for
/// output nodes.
pub struct OpRegistry {
    ops: FxHashMap<&'static str, Arc<OpDef>>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self {
            ops: FxHashMap::default(),
        }
    }

    /// Registry pre-populated with the built-in catalog: projection (`pick`,
    /// `dict`), rendering (`join_to_str`), hashing (`asset_sha256`), and the
    /// null-safe comparisons (`eq`, `ne`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            OpDef::new(op_names::PICK, OutputType::Infer(infer_pick))
                // The empty dict is the top of the width-subtyping order, so
                // any typed dict satisfies the parameter, standalone or as a
                // list element.
                .with_param(
                    "obj",
                    Type::union([
                        Type::TypedDict(TypedDict::default()),
                        Type::list(Type::TypedDict(TypedDict::default())),
                    ]),
                )
                .with_param("key", Type::TEXT),
        );
        registry.register(
            OpDef::new(op_names::DICT, OutputType::Infer(infer_dict))
                .with_variadic_group(vec![
                    Param::new("name", Type::TEXT),
                    Param::new("value", Type::Any),
                ])
                .with_null_policy(NullPolicy::Consume),
        );
        registry.register(
            OpDef::new(op_names::JOIN_TO_STR, OutputType::Fixed(Type::TEXT))
                .with_param("list", Type::list(Type::Any))
                .with_param("delimiter", Type::TEXT),
        );
        registry.register(
            OpDef::new(op_names::ASSET_SHA256, OutputType::Fixed(Type::TEXT))
                .with_param("asset", Type::ASSET)
                .with_cacheable(),
        );
        registry.register(
            OpDef::new(op_names::EQ, OutputType::Fixed(Type::BOOL))
                .with_param("lhs", Type::Any)
                .with_param("rhs", Type::Any)
                .with_null_policy(NullPolicy::Consume),
        );
        registry.register(
            OpDef::new(op_names::NE, OutputType::Fixed(Type::BOOL))
                .with_param("lhs", Type::Any)
                .with_param("rhs", Type::Any)
                .with_null_policy(NullPolicy::Consume),
        );
        registry
    }

    /// Register an op, replacing any previous definition with the same name.
    pub fn register(&mut self, def: OpDef) {
        self.ops.insert(def.name, Arc::new(def));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<OpDef>> {
        self.ops.get(name)
    }

    /// Apply `name` to `inputs`, checking arity and input types against the
    /// signature and computing the output type. The only failure modes are
    /// unknown ops, arity mismatches, and [`Error::TypeMismatch`].
    pub fn apply(&self, name: &str, inputs: Vec<NodeRef>) -> Result<NodeRef> {
        let Some(def) = self.ops.get(name) else {
            return Err(Error::InvalidArgument(format!("unknown op '{}'", name)));
        };
        def.check_arity(inputs.len())?;

        let mut any_optional = false;
        for (index, input) in inputs.iter().enumerate() {
            let param = def
                .param_at(index)
                .ok_or_else(|| Error::Internal(format!("op '{}' arity drift", name)))?;
            let supplied = input.ty();
            match def.null_policy {
                NullPolicy::Consume => {
                    if !param.ty.assign_type(supplied) {
                        return Err(Error::type_mismatch(name, param.name, &param.ty, supplied));
                    }
                }
                NullPolicy::Propagate => {
                    if supplied.is_optional() {
                        any_optional = true;
                    }
                    let stripped = non_none(supplied);
                    // A pure-null input never reaches the op body, so any
                    // parameter accepts it.
                    if stripped != Type::None && !param.ty.assign_type(&stripped) {
                        return Err(Error::type_mismatch(name, param.name, &param.ty, supplied));
                    }
                }
            }
        }

        let mut out_ty = match &def.output {
            OutputType::Fixed(ty) => ty.clone(),
            OutputType::Infer(infer) => infer(&inputs)?,
        };
        if def.null_policy == NullPolicy::Propagate && any_optional {
            out_ty = Type::optional(out_ty);
        }
        trace!(op = name, inputs = inputs.len(), output = %out_ty, "apply");
        Ok(Node::output(def.name, out_ty, inputs))
    }

    /// Project a named field out of a typed-dict node; sugar for `pick` with
    /// a constant key.
    pub fn field(&self, obj: NodeRef, name: &str) -> Result<NodeRef> {
        let key = Node::constant(Value::Text(name.to_string()));
        self.apply(op_names::PICK, vec![obj, key])
    }
}

impl Default for OpRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// `pick` output type: the declared type of the keyed field, lifted to
/// `List(field)` when the input is a list of typed dicts.
///
/// The key must be a constant string naming a declared field; anything else
/// is a construction error.
fn infer_pick(inputs: &[NodeRef]) -> Result<Type> {
    let obj_ty = non_none(inputs[0].ty());
    let key = match inputs[1].as_const() {
        Some(Value::Text(key)) => key,
        _ => {
            return Err(Error::InvalidArgument(
                "pick requires a constant string key".to_string(),
            ));
        }
    };
    match &obj_ty {
        Type::List(elem) => Ok(Type::list(pick_field_type(elem, key, &obj_ty)?)),
        other => pick_field_type(other, key, &obj_ty),
    }
}

/// The declared type of `key` in a dict type, distributing over unions of
/// dicts. Every union member must declare the field.
fn pick_field_type(dict_ty: &Type, key: &str, obj_ty: &Type) -> Result<Type> {
    match dict_ty {
        Type::TypedDict(dict) => match dict.field(key) {
            Some(field_ty) => Ok(field_ty.clone()),
            None => Err(Error::type_mismatch(
                op_names::PICK,
                "key",
                format!("a field of {}", obj_ty),
                format!("\"{}\"", key),
            )),
        },
        Type::Union(members) => Ok(Type::union(
            members
                .iter()
                .map(|member| pick_field_type(member, key, obj_ty))
                .collect::<Result<Vec<_>>>()?,
        )),
        _ => Err(Error::Internal(format!(
            "pick input survived signature check with type {}",
            obj_ty
        ))),
    }
}

/// `dict` output type: a typed dict assembled from `(name, value)` input
/// pairs, field order following input order.
fn infer_dict(inputs: &[NodeRef]) -> Result<Type> {
    let mut fields: Vec<(String, Type)> = Vec::with_capacity(inputs.len() / 2);
    for pair in inputs.chunks(2) {
        let name = match pair[0].as_const() {
            Some(Value::Text(name)) => name.clone(),
            _ => {
                return Err(Error::InvalidArgument(
                    "dict requires constant string field names".to_string(),
                ));
            }
        };
        if fields.iter().any(|(existing, _)| existing == &name) {
            return Err(Error::InvalidArgument(format!(
                "dict field '{}' given more than once",
                name
            )));
        }
        fields.push((name, pair[1].ty().clone()));
    }
    Ok(Type::typed_dict(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> OpRegistry {
        OpRegistry::with_defaults()
    }

    #[test]
    fn test_eq_builds_bool_node() {
        let reg = registry();
        let node = reg
            .apply(op_names::EQ, vec![Node::constant(1i64), Node::constant(2i64)])
            .unwrap();
        assert_eq!(node.ty(), &Type::BOOL);
        assert_eq!(node.op(), Some(op_names::EQ));
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let err = registry().apply("no_such_op", vec![]).unwrap_err();
        assert!(err.to_string().contains("no_such_op"));
    }

    #[test]
    fn test_asset_sha256_rejects_non_asset() {
        let err = registry()
            .apply(op_names::ASSET_SHA256, vec![Node::constant(1i64)])
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("asset_sha256"), "got: {msg}");
        assert!(msg.contains("Asset"), "got: {msg}");
    }

    #[test]
    fn test_pick_infers_field_type() {
        let reg = registry();
        let obj = Node::constant(Value::Dict(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Text("x".to_string())),
        ]));
        let node = reg.field(obj, "b").unwrap();
        assert_eq!(node.ty(), &Type::TEXT);
    }

    #[test]
    fn test_pick_unknown_key_fails_at_construction() {
        let reg = registry();
        let obj = Node::constant(Value::Dict(vec![("a".to_string(), Value::Int(1))]));
        let err = reg.field(obj, "missing").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "got: {err}");
    }

    #[test]
    fn test_pick_on_list_of_dicts_lifts_to_list() {
        let reg = registry();
        let obj = Node::constant_typed(
            Type::list(Type::typed_dict([("a", Type::INT), ("b", Type::TEXT)])),
            Value::List(vec![Value::Dict(vec![
                ("a".to_string(), Value::Int(1)),
                ("b".to_string(), Value::Text("x".to_string())),
            ])]),
        )
        .unwrap();
        let node = reg.field(obj, "a").unwrap();
        assert_eq!(node.ty(), &Type::list(Type::INT));
    }

    #[test]
    fn test_pick_across_heterogeneous_list_unions_field_types() {
        let reg = registry();
        let obj = Node::constant(Value::List(vec![
            Value::Dict(vec![("a".to_string(), Value::Int(1))]),
            Value::Dict(vec![("a".to_string(), Value::Text("x".to_string()))]),
        ]));
        let node = reg.field(obj, "a").unwrap();
        assert_eq!(
            node.ty(),
            &Type::list(Type::union([Type::INT, Type::TEXT]))
        );
    }

    #[test]
    fn test_pick_on_optional_dict_wraps_output_optional() {
        let reg = registry();
        let obj = Node::constant_typed(
            Type::optional(Type::typed_dict([("a", Type::INT)])),
            Value::Null,
        )
        .unwrap();
        let key = Node::constant("a");
        let node = reg.apply(op_names::PICK, vec![obj, key]).unwrap();
        assert_eq!(node.ty(), &Type::optional(Type::INT));
    }

    #[test]
    fn test_dict_assembles_typed_dict_in_input_order() {
        let reg = registry();
        let node = reg
            .apply(
                op_names::DICT,
                vec![
                    Node::constant("x"),
                    Node::constant(1i64),
                    Node::constant("y"),
                    Node::constant(2.5f64),
                ],
            )
            .unwrap();
        assert_eq!(
            node.ty(),
            &Type::typed_dict([("x", Type::INT), ("y", Type::FLOAT)])
        );
    }

    #[test]
    fn test_dict_rejects_odd_inputs_and_duplicates() {
        let reg = registry();
        let err = reg
            .apply(op_names::DICT, vec![Node::constant("x")])
            .unwrap_err();
        assert!(err.to_string().contains("groups of 2"), "got: {err}");

        let err = reg
            .apply(
                op_names::DICT,
                vec![
                    Node::constant("x"),
                    Node::constant(1i64),
                    Node::constant("x"),
                    Node::constant(2i64),
                ],
            )
            .unwrap_err();
        assert!(err.to_string().contains("more than once"), "got: {err}");
    }

    #[test]
    fn test_join_to_str_accepts_any_list() {
        let reg = registry();
        let list = Node::constant(Value::List(vec![Value::Int(1), Value::Int(2)]));
        let node = reg
            .apply(op_names::JOIN_TO_STR, vec![list, Node::constant(",")])
            .unwrap();
        assert_eq!(node.ty(), &Type::TEXT);
    }
}
