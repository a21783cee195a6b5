//! Graph evaluation.
//!
//! [`Engine::execute`] walks a set of root nodes depth-first and produces one
//! [`Evaluated`] result per root. Within one execution, shared subgraphs are
//! computed once (a memo keyed by node handle); across executions, results
//! are reused through a fingerprint-keyed cache whose policy comes from
//! [`CacheMode::from_env`], sampled once per execution.
//!
//! Kernels mirror the op catalog: projection (`pick`, `dict`), rendering
//! (`join_to_str`), artifact hashing (`asset_sha256`, which needs an
//! [`OffloadClient`]), and the null-safe comparisons (`eq`, `ne`). Every
//! kernel accepts scalar and columnar operands; a scalar meeting a column is
//! broadcast to the column's length.

use std::sync::{Arc, RwLock};

use arrow::array::{ArrayRef, StringArray};
use lace_array::{TypedArray, cmp, project, strings};
use lace_graph::{
    Fingerprint, FingerprintMemo, FlatGraph, Node, NodeRef, NullPolicy, OpRegistry, from_flat,
    op_names,
};
use lace_result::{Error, Result};
use lace_types::{AssetRef, Type, Value, non_none};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::config::CacheMode;
use crate::context::{ExecMode, execution_mode};
use crate::offload::OffloadClient;
use crate::tags::isolated_tag_scope;

/// The runtime value of one evaluated node.
///
/// A node's declared type describes elements, so a `Bool`-typed node may
/// evaluate to a single boolean or to a whole boolean column depending on
/// what flowed into it.
#[derive(Debug, Clone)]
pub enum Evaluated {
    Scalar(Value),
    Column(TypedArray),
}

impl Evaluated {
    /// The element type of this result.
    pub fn ty(&self) -> Type {
        match self {
            Evaluated::Scalar(value) => value.ty(),
            Evaluated::Column(col) => col.ty().clone(),
        }
    }

    pub fn is_null_scalar(&self) -> bool {
        matches!(self, Evaluated::Scalar(Value::Null))
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Evaluated::Scalar(value) => Some(value),
            Evaluated::Column(_) => None,
        }
    }

    pub fn as_column(&self) -> Option<&TypedArray> {
        match self {
            Evaluated::Scalar(_) => None,
            Evaluated::Column(col) => Some(col),
        }
    }

    /// Collapse to a plain [`Value`]; columns become lists row by row.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Evaluated::Scalar(value) => Ok(value),
            Evaluated::Column(col) => Ok(Value::List(col.to_values()?)),
        }
    }
}

/// What [`Engine::run_or_defer`] did with a node.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The node ran under an eager scope; here is its result.
    Computed(Evaluated),
    /// The node was left for later under a lazy scope.
    Deferred(NodeRef),
}

struct EvalCtx {
    memo: FxHashMap<*const Node, Evaluated>,
    fps: FingerprintMemo,
    cache_mode: CacheMode,
}

/// Evaluates graphs against an op registry, an optional offload client, and
/// a fingerprint-keyed result cache.
pub struct Engine {
    registry: Arc<OpRegistry>,
    offload: Option<OffloadClient>,
    cache: RwLock<FxHashMap<Fingerprint, Evaluated>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine over the built-in op catalog, with no offload client.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(OpRegistry::with_defaults()))
    }

    pub fn with_registry(registry: Arc<OpRegistry>) -> Self {
        Self {
            registry,
            offload: None,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Attach the offload client `asset_sha256` reads artifact bytes through.
    pub fn with_offload(mut self, client: OffloadClient) -> Self {
        self.offload = Some(client);
        self
    }

    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    /// Number of results currently in the cross-execute cache.
    pub fn cached_results(&self) -> usize {
        self.cache
            .read()
            .expect("result cache read lock poisoned")
            .len()
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .expect("result cache write lock poisoned")
            .clear();
    }

    /// Evaluate each root and return the results in root order.
    pub fn execute(&self, roots: &[NodeRef]) -> Result<Vec<Evaluated>> {
        self.execute_bound(roots, &[])
    }

    /// Evaluate each root and collapse the results to plain values; columns
    /// come back as row lists.
    pub fn execute_values(&self, roots: &[NodeRef]) -> Result<Vec<Value>> {
        self.execute(roots)?
            .into_iter()
            .map(Evaluated::into_value)
            .collect()
    }

    /// Evaluate `roots` with precomputed results substituted for the bound
    /// nodes. Bindings are how columnar data enters a graph: bind a source
    /// node to a [`TypedArray`] and every op downstream runs columnar.
    ///
    /// A binding changes what a node means without changing its fingerprint,
    /// so bound executions skip the cross-execute cache entirely. The whole
    /// call runs inside an isolated tag scope: tags attached mid-evaluation
    /// never outlive the execution.
    pub fn execute_bound(
        &self,
        roots: &[NodeRef],
        bindings: &[(NodeRef, Evaluated)],
    ) -> Result<Vec<Evaluated>> {
        let _tags = isolated_tag_scope();
        let cache_mode = if bindings.is_empty() {
            CacheMode::from_env()
        } else {
            CacheMode::Disabled
        };
        debug!(
            roots = roots.len(),
            bindings = bindings.len(),
            %cache_mode,
            "execute"
        );

        let mut ctx = EvalCtx {
            memo: FxHashMap::default(),
            fps: FingerprintMemo::new(),
            cache_mode,
        };
        for (node, result) in bindings {
            let bound_ty = result.ty();
            if !node.ty().assign_type(&bound_ty) {
                return Err(Error::type_mismatch("bind", node, node.ty(), &bound_ty));
            }
            ctx.memo.insert(Arc::as_ptr(node), result.clone());
        }
        roots.iter().map(|root| self.eval(root, &mut ctx)).collect()
    }

    /// Evaluate a single root.
    pub fn execute_one(&self, root: &NodeRef) -> Result<Evaluated> {
        let mut results = self.execute(std::slice::from_ref(root))?;
        results
            .pop()
            .ok_or_else(|| Error::Internal("execute returned no result for root".to_string()))
    }

    /// Decode a wire graph and evaluate its roots.
    pub fn execute_flat(&self, flat: &FlatGraph) -> Result<Vec<Evaluated>> {
        let roots = from_flat(flat)?;
        self.execute(&roots)
    }

    /// Run `node` now or hand it back, depending on the innermost
    /// execution-mode scope at this moment.
    pub fn run_or_defer(&self, node: &NodeRef) -> Result<RunOutcome> {
        match execution_mode() {
            ExecMode::Eager => Ok(RunOutcome::Computed(self.execute_one(node)?)),
            ExecMode::Lazy => {
                trace!(node = %node, "deferred under lazy scope");
                Ok(RunOutcome::Deferred(node.clone()))
            }
        }
    }

    fn eval(&self, node: &NodeRef, ctx: &mut EvalCtx) -> Result<Evaluated> {
        let ptr = Arc::as_ptr(node);
        if let Some(hit) = ctx.memo.get(&ptr) {
            return Ok(hit.clone());
        }
        let result = match node.as_ref() {
            Node::Const { value, .. } => materialize_const(node.ty(), value)?,
            Node::Output { op, .. } => self.eval_output(node, op, ctx)?,
        };
        ctx.memo.insert(ptr, result.clone());
        Ok(result)
    }

    fn eval_output(&self, node: &NodeRef, op: &str, ctx: &mut EvalCtx) -> Result<Evaluated> {
        let def = self
            .registry
            .get(op)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown op '{}'", op)))?
            .clone();

        let cache_key = if ctx.cache_mode.retains(def.is_cacheable()) {
            let fp = ctx.fps.fingerprint(node);
            let cache = self.cache.read().expect("result cache read lock poisoned");
            if let Some(hit) = cache.get(&fp) {
                trace!(op, %fp, "cache hit");
                return Ok(hit.clone());
            }
            Some(fp)
        } else {
            None
        };

        let inputs: Vec<Evaluated> = node
            .inputs()
            .iter()
            .map(|input| self.eval(input, ctx))
            .collect::<Result<_>>()?;

        // Under the propagate policy a null scalar input means the op body
        // never runs; null rows inside columns are the kernels' concern.
        let result = if def.null_policy() == NullPolicy::Propagate
            && inputs.iter().any(Evaluated::is_null_scalar)
        {
            Evaluated::Scalar(Value::Null)
        } else {
            self.dispatch(op, node, &inputs)?
        };

        if let Some(fp) = cache_key {
            self.cache
                .write()
                .expect("result cache write lock poisoned")
                .insert(fp, result.clone());
        }
        Ok(result)
    }

    fn dispatch(&self, op: &str, node: &NodeRef, inputs: &[Evaluated]) -> Result<Evaluated> {
        trace!(op, inputs = inputs.len(), "dispatch");
        match op {
            op_names::PICK => eval_pick(node, inputs),
            op_names::DICT => eval_dict(node, inputs),
            op_names::JOIN_TO_STR => eval_join_to_str(node, inputs),
            op_names::ASSET_SHA256 => self.eval_asset_sha256(node, inputs),
            op_names::EQ => eval_compare(inputs, true),
            op_names::NE => eval_compare(inputs, false),
            other => Err(Error::InvalidArgument(format!(
                "op '{}' has no evaluation kernel",
                other
            ))),
        }
    }

    fn eval_asset_sha256(&self, node: &NodeRef, inputs: &[Evaluated]) -> Result<Evaluated> {
        let client = self.offload.as_ref().ok_or_else(|| {
            Error::Offload("no offload client is attached to this engine".to_string())
        })?;
        match &inputs[0] {
            Evaluated::Scalar(Value::Asset(asset)) => {
                Ok(Evaluated::Scalar(Value::Text(hash_asset(client, asset)?)))
            }
            Evaluated::Scalar(other) => Err(Error::Internal(format!(
                "asset_sha256 input survived signature check holding {}",
                other
            ))),
            Evaluated::Column(col) => {
                // Dictionary-encoded asset columns hash once per distinct
                // artifact; `map_values` re-wraps the digests with the
                // original keys.
                let out = col.map_values(node.ty().clone(), |values| {
                    hash_asset_rows(client, values)
                })?;
                Ok(Evaluated::Column(out))
            }
        }
    }
}

/// SHA-256 each row of a struct-encoded asset array into hex strings.
fn hash_asset_rows(client: &OffloadClient, values: &ArrayRef) -> Result<ArrayRef> {
    let assets = TypedArray::try_new(Arc::clone(values), Type::optional(Type::ASSET))?;
    let mut rows: Vec<Option<String>> = Vec::with_capacity(assets.len());
    for asset in project::asset_refs(&assets)? {
        rows.push(match asset {
            Some(asset) => Some(hash_asset(client, &asset)?),
            None => None,
        });
    }
    Ok(Arc::new(StringArray::from(rows)))
}

/// A list constant whose element type has a columnar encoding materializes
/// into a column, one row per element; every other constant stays scalar.
/// Downstream kernels then run columnar over list literals exactly as they
/// do over bound columns.
fn materialize_const(ty: &Type, value: &Value) -> Result<Evaluated> {
    if let Value::List(items) = value {
        if let Type::List(elem) = non_none(ty) {
            if elem.arrow_type().is_some() {
                let col = TypedArray::from_values(*elem, items)?;
                return Ok(Evaluated::Column(col));
            }
        }
    }
    Ok(Evaluated::Scalar(value.clone()))
}

/// SHA-256 of the artifact bytes behind `asset`, as lowercase hex.
fn hash_asset(client: &OffloadClient, asset: &AssetRef) -> Result<String> {
    let bytes = client.read_artifact(asset.artifact, &asset.path)?;
    let digest = Sha256::digest(&bytes);
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    Ok(hex)
}

fn eval_pick(node: &NodeRef, inputs: &[Evaluated]) -> Result<Evaluated> {
    let key = match node.inputs()[1].as_const() {
        Some(Value::Text(key)) => key.as_str(),
        _ => {
            return Err(Error::Internal(
                "pick key survived construction without a constant string".to_string(),
            ));
        }
    };
    match &inputs[0] {
        Evaluated::Scalar(Value::Dict(pairs)) => Ok(Evaluated::Scalar(dict_field(pairs, key))),
        // Lists of dicts without a columnar encoding stay literal; pick maps
        // over the elements.
        Evaluated::Scalar(Value::List(items)) => {
            let picked = items
                .iter()
                .map(|item| match item {
                    Value::Dict(pairs) => Ok(dict_field(pairs, key)),
                    Value::Null => Ok(Value::Null),
                    other => Err(Error::Internal(format!(
                        "pick input survived signature check holding a list of {}",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Evaluated::Scalar(Value::List(picked)))
        }
        Evaluated::Scalar(other) => Err(Error::Internal(format!(
            "pick input survived signature check holding {}",
            other
        ))),
        Evaluated::Column(col) => Ok(Evaluated::Column(project::pick_field(col, key)?)),
    }
}

/// Value of `key` in a literal dict; absent fields read as null.
fn dict_field(pairs: &[(String, Value)], key: &str) -> Value {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
        .unwrap_or(Value::Null)
}

fn eval_dict(node: &NodeRef, inputs: &[Evaluated]) -> Result<Evaluated> {
    let node_inputs = node.inputs();
    let mut names = Vec::with_capacity(node_inputs.len() / 2);
    let mut values: Vec<(&Evaluated, &Type)> = Vec::with_capacity(node_inputs.len() / 2);
    for (pair, result) in node_inputs.chunks(2).zip(inputs.chunks(2)) {
        let name = match pair[0].as_const() {
            Some(Value::Text(name)) => name.clone(),
            _ => {
                return Err(Error::Internal(
                    "dict field name survived construction without a constant string".to_string(),
                ));
            }
        };
        names.push(name);
        values.push((&result[1], pair[1].ty()));
    }

    let rows = values.iter().find_map(|(result, ty)| match result {
        Evaluated::Column(col) if !is_single_list(ty, col) => Some(col.len()),
        _ => None,
    });
    match rows {
        None => {
            let pairs = names
                .into_iter()
                .zip(&values)
                .map(|(name, (result, _))| {
                    let value = match result {
                        Evaluated::Scalar(value) => value.clone(),
                        Evaluated::Column(col) => Value::List(col.to_values()?),
                    };
                    Ok((name, value))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Evaluated::Scalar(Value::Dict(pairs)))
        }
        Some(rows) => {
            let fields = names
                .into_iter()
                .zip(&values)
                .map(|(name, (result, ty))| {
                    let col = match result {
                        Evaluated::Column(col) if !is_single_list(ty, col) => col.clone(),
                        Evaluated::Column(col) => {
                            broadcast(&Value::List(col.to_values()?), rows, ty)?
                        }
                        Evaluated::Scalar(value) => broadcast(value, rows, ty)?,
                    };
                    Ok((name, col))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Evaluated::Column(project::build_struct(&fields)?))
        }
    }
}

/// A column counts as one list literal, not as rows, when its declared slot
/// is list-typed and the column carries bare elements.
fn is_single_list(declared: &Type, col: &TypedArray) -> bool {
    matches!(non_none(declared), Type::List(_)) && !matches!(non_none(col.ty()), Type::List(_))
}

fn eval_join_to_str(node: &NodeRef, inputs: &[Evaluated]) -> Result<Evaluated> {
    let delimiter = match &inputs[1] {
        Evaluated::Scalar(Value::Text(delimiter)) => delimiter.as_str(),
        _ => {
            return Err(Error::InvalidArgument(
                "join_to_str delimiter must be a single string".to_string(),
            ));
        }
    };
    let list_ty = match non_none(node.inputs()[0].ty()) {
        ty @ Type::List(_) => ty,
        other => Type::list(other),
    };
    match &inputs[0] {
        // A column of lists renders row by row; a materialized list constant
        // arrives as a column of bare elements and renders as one string.
        Evaluated::Column(col) if matches!(non_none(col.ty()), Type::List(_)) => {
            Ok(Evaluated::Column(strings::join_to_str(col, delimiter)?))
        }
        Evaluated::Column(col) => {
            join_singleton(&Value::List(col.to_values()?), list_ty, delimiter)
        }
        Evaluated::Scalar(value @ Value::List(_)) => join_singleton(value, list_ty, delimiter),
        Evaluated::Scalar(other) => Err(Error::Internal(format!(
            "join_to_str input survived signature check holding {}",
            other
        ))),
    }
}

/// One-row column through the columnar kernel keeps scalar and columnar
/// rendering identical.
fn join_singleton(value: &Value, list_ty: Type, delimiter: &str) -> Result<Evaluated> {
    let arr = TypedArray::from_values(list_ty, std::slice::from_ref(value))?;
    let joined = strings::join_to_str(&arr, delimiter)?;
    Ok(Evaluated::Scalar(joined.value(0)?))
}

fn eval_compare(inputs: &[Evaluated], is_eq: bool) -> Result<Evaluated> {
    let result = match (&inputs[0], &inputs[1]) {
        (Evaluated::Column(lhs), Evaluated::Column(rhs)) => Evaluated::Column(if is_eq {
            cmp::equal(lhs, rhs)?
        } else {
            cmp::not_equal(lhs, rhs)?
        }),
        (Evaluated::Column(lhs), Evaluated::Scalar(rhs)) => Evaluated::Column(if is_eq {
            cmp::equal_scalar(lhs, rhs)?
        } else {
            cmp::not_equal_scalar(lhs, rhs)?
        }),
        // Equality is symmetric, so a scalar on the left reuses the
        // column-vs-scalar kernels.
        (Evaluated::Scalar(lhs), Evaluated::Column(rhs)) => Evaluated::Column(if is_eq {
            cmp::equal_scalar(rhs, lhs)?
        } else {
            cmp::not_equal_scalar(rhs, lhs)?
        }),
        (Evaluated::Scalar(lhs), Evaluated::Scalar(rhs)) => {
            let same = scalar_equal(lhs, rhs);
            Evaluated::Scalar(Value::Bool(if is_eq { same } else { !same }))
        }
    };
    Ok(result)
}

/// Null-safe scalar equality: two nulls are equal, a null never equals a
/// non-null, and mixed int/float comparisons widen instead of truncating.
fn scalar_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Int(lhs), Value::Float(rhs)) => (*lhs as f64) == *rhs,
        (Value::Float(lhs), Value::Int(rhs)) => *lhs == (*rhs as f64),
        _ => lhs == rhs,
    }
}

fn broadcast(value: &Value, rows: usize, ty: &Type) -> Result<TypedArray> {
    let ty = match non_none(ty) {
        // Unconstrained declared types take the value's own shape.
        Type::Any | Type::Union(_) => value.ty(),
        _ => ty.clone(),
    };
    TypedArray::from_values(ty, &vec![value.clone(); rows])
}

#[cfg(test)]
mod tests {
    use super::*;
    use lace_graph::fingerprint;

    fn engine() -> Engine {
        Engine::new()
    }

    fn eq_node(engine: &Engine, lhs: NodeRef, rhs: NodeRef) -> NodeRef {
        engine.registry().apply(op_names::EQ, vec![lhs, rhs]).unwrap()
    }

    #[test]
    fn test_constant_evaluates_to_itself() {
        let engine = engine();
        let result = engine.execute_one(&Node::constant(7i64)).unwrap();
        assert_eq!(result.as_scalar(), Some(&Value::Int(7)));
    }

    #[test]
    fn test_scalar_equality_is_null_safe() {
        let engine = engine();
        let null = Node::constant_typed(Type::optional(Type::INT), Value::Null).unwrap();

        let both_null = eq_node(&engine, null.clone(), null.clone());
        let one_null = eq_node(&engine, null, Node::constant(3i64));
        let results = engine.execute(&[both_null, one_null]).unwrap();
        assert_eq!(results[0].as_scalar(), Some(&Value::Bool(true)));
        assert_eq!(results[1].as_scalar(), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_scalar_equality_widens_mixed_numerics() {
        let engine = engine();
        let same = eq_node(&engine, Node::constant(2i64), Node::constant(2.0f64));
        let close = eq_node(&engine, Node::constant(2i64), Node::constant(2.5f64));
        let results = engine.execute(&[same, close]).unwrap();
        assert_eq!(results[0].as_scalar(), Some(&Value::Bool(true)));
        assert_eq!(results[1].as_scalar(), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_pick_reads_scalar_dicts() {
        let engine = engine();
        let obj = Node::constant(Value::Dict(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Text("x".to_string())),
        ]));
        let node = engine.registry().field(obj, "b").unwrap();
        let result = engine.execute_one(&node).unwrap();
        assert_eq!(result.as_scalar(), Some(&Value::Text("x".to_string())));
    }

    #[test]
    fn test_pick_propagates_null_dict() {
        let engine = engine();
        let obj = Node::constant_typed(
            Type::optional(Type::typed_dict([("a", Type::INT)])),
            Value::Null,
        )
        .unwrap();
        let node = engine
            .registry()
            .apply(op_names::PICK, vec![obj, Node::constant("a")])
            .unwrap();
        let result = engine.execute_one(&node).unwrap();
        assert!(result.is_null_scalar());
    }

    #[test]
    fn test_dict_assembles_scalar_results() {
        let engine = engine();
        let node = engine
            .registry()
            .apply(
                op_names::DICT,
                vec![
                    Node::constant("x"),
                    Node::constant(1i64),
                    Node::constant("y"),
                    Node::constant("two"),
                ],
            )
            .unwrap();
        let result = engine.execute_one(&node).unwrap();
        assert_eq!(
            result.as_scalar(),
            Some(&Value::Dict(vec![
                ("x".to_string(), Value::Int(1)),
                ("y".to_string(), Value::Text("two".to_string())),
            ]))
        );
    }

    #[test]
    fn test_dict_keeps_list_field_as_one_value() {
        // The list constant materializes to a column, but the `tags` slot is
        // list-typed, so it must land as a single list value rather than
        // stretch the dict to one row per element.
        let engine = engine();
        let node = engine
            .registry()
            .apply(
                op_names::DICT,
                vec![
                    Node::constant("id"),
                    Node::constant(7i64),
                    Node::constant("tags"),
                    Node::constant(Value::List(vec![Value::Int(1), Value::Int(2)])),
                ],
            )
            .unwrap();
        let result = engine.execute_one(&node).unwrap();
        assert_eq!(
            result.as_scalar(),
            Some(&Value::Dict(vec![
                ("id".to_string(), Value::Int(7)),
                (
                    "tags".to_string(),
                    Value::List(vec![Value::Int(1), Value::Int(2)]),
                ),
            ]))
        );
    }

    #[test]
    fn test_join_to_str_renders_scalar_lists() {
        let engine = engine();
        let list = Node::constant(Value::List(vec![
            Value::Int(1),
            Value::Null,
            Value::Int(3),
        ]));
        let node = engine
            .registry()
            .apply(op_names::JOIN_TO_STR, vec![list, Node::constant(",")])
            .unwrap();
        let result = engine.execute_one(&node).unwrap();
        assert_eq!(result.as_scalar(), Some(&Value::Text("1,,3".to_string())));
    }

    #[test]
    fn test_list_constants_compare_element_wise() {
        let engine = engine();
        let lhs = Node::constant(Value::List(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
        ]));
        let rhs = Node::constant(Value::List(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(4),
        ]));
        let node = eq_node(&engine, lhs, rhs);
        let result = engine.execute_one(&node).unwrap();
        let out = result.as_column().unwrap();
        assert_eq!(
            out.to_values().unwrap(),
            vec![Value::Bool(true), Value::Bool(true), Value::Bool(false)]
        );
    }

    #[test]
    fn test_pick_over_list_constant_runs_columnar() {
        let engine = engine();
        let people = Node::constant(Value::List(vec![
            Value::Dict(vec![("id".to_string(), Value::Int(1))]),
            Value::Dict(vec![("id".to_string(), Value::Int(2))]),
        ]));
        let node = engine.registry().field(people, "id").unwrap();
        assert_eq!(node.ty(), &Type::list(Type::INT));

        let result = engine.execute_one(&node).unwrap();
        let out = result.as_column().unwrap();
        assert_eq!(out.ty(), &Type::INT);
        assert_eq!(out.to_values().unwrap(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_pick_over_heterogeneous_list_stays_literal() {
        let engine = engine();
        let mixed = Node::constant(Value::List(vec![
            Value::Dict(vec![("a".to_string(), Value::Int(1))]),
            Value::Dict(vec![("a".to_string(), Value::Text("x".to_string()))]),
        ]));
        let node = engine.registry().field(mixed, "a").unwrap();
        let result = engine.execute_one(&node).unwrap();
        assert_eq!(
            result.as_scalar(),
            Some(&Value::List(vec![
                Value::Int(1),
                Value::Text("x".to_string())
            ]))
        );
    }

    #[test]
    fn test_shared_subgraph_evaluates_once_per_execute() {
        let engine = engine();
        let shared = eq_node(&engine, Node::constant(1i64), Node::constant(1i64));
        let root = eq_node(&engine, shared.clone(), shared);
        let result = engine.execute_one(&root).unwrap();
        assert_eq!(result.as_scalar(), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_columnar_binding_flows_through_ops() {
        let engine = engine();
        let source = Node::constant_typed(Type::optional(Type::INT), Value::Null).unwrap();
        let node = eq_node(&engine, source.clone(), Node::constant(2i64));

        let column = TypedArray::from_values(
            Type::optional(Type::INT),
            &[Value::Int(2), Value::Null, Value::Int(5)],
        )
        .unwrap();
        let results = engine
            .execute_bound(&[node], &[(source, Evaluated::Column(column))])
            .unwrap();
        let out = results[0].as_column().unwrap();
        assert_eq!(
            out.to_values().unwrap(),
            vec![Value::Bool(true), Value::Bool(false), Value::Bool(false)]
        );
    }

    #[test]
    fn test_binding_type_is_checked() {
        let engine = engine();
        let source = Node::constant(1i64);
        let err = engine
            .execute_bound(
                &[source.clone()],
                &[(source, Evaluated::Scalar(Value::Text("no".to_string())))],
            )
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "got: {err}");
    }

    #[test]
    fn test_missing_offload_client_is_an_offload_error() {
        let engine = engine();
        let asset = Node::constant(Value::Asset(AssetRef::new(1u64.into(), "a.bin")));
        let node = engine
            .registry()
            .apply(op_names::ASSET_SHA256, vec![asset])
            .unwrap();
        let err = engine.execute_one(&node).unwrap_err();
        assert!(matches!(err, Error::Offload(_)), "got: {err}");
    }

    #[test]
    fn test_flat_graph_executes_like_the_original() {
        let engine = engine();
        let node = eq_node(&engine, Node::constant(4i64), Node::constant(4i64));
        let flat = lace_graph::to_flat(std::slice::from_ref(&node));

        let results = engine.execute_flat(&flat).unwrap();
        assert_eq!(results[0].as_scalar(), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_run_or_defer_follows_the_active_scope() {
        let engine = engine();
        let node = eq_node(&engine, Node::constant(1i64), Node::constant(2i64));

        let _lazy = crate::lazy_execution();
        match engine.run_or_defer(&node).unwrap() {
            RunOutcome::Deferred(deferred) => {
                assert!(Arc::ptr_eq(&deferred, &node));
                assert_eq!(fingerprint(&deferred), fingerprint(&node));
            }
            RunOutcome::Computed(_) => panic!("lazy scope must defer"),
        }

        let _eager = crate::eager_execution();
        match engine.run_or_defer(&node).unwrap() {
            RunOutcome::Computed(result) => {
                assert_eq!(result.as_scalar(), Some(&Value::Bool(false)));
            }
            RunOutcome::Deferred(_) => panic!("eager scope must compute"),
        }
    }
}
