//! Null-safe vector comparisons.
//!
//! Arrow's comparison kernels propagate nulls: `null == anything` is null.
//! The engine wants SQL-like join semantics instead, where null is a value
//! that equals itself:
//!
//! - both sides null → `equal` is `true`, `not_equal` is `false`
//! - exactly one side null → `equal` is `false`, `not_equal` is `true`
//! - both sides present → the raw kernel result
//!
//! Outputs therefore never carry nulls, and `equal` / `not_equal` are exact
//! complements position-by-position.
//!
//! Dictionary-encoded inputs are decoded before comparison so the null logic
//! sees per-row validity. An untyped all-null side (`DataType::Null`) short
//! circuits into pure mask arithmetic: nothing equals a value, and null
//! equals null. Comparing nested types (structs, lists) is not supported by
//! the underlying kernels; callers make such values comparison-safe first.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Scalar};
use arrow::compute::kernels::cmp;
use arrow::compute::{self, and, is_null, not, or, prep_null_mask_filter};
use arrow::datatypes::DataType;

use lace_result::{Error, Result};
use lace_types::{Type, Value};

use crate::TypedArray;
use crate::convert::build_array;

/// Element-wise null-safe equality of two columns.
pub fn equal(lhs: &TypedArray, rhs: &TypedArray) -> Result<TypedArray> {
    let (l, r) = (lhs.decoded()?, rhs.decoded()?);
    check_len(&l, &r)?;
    let bools = if has_null_type(&l) || has_null_type(&r) {
        // The non-null-typed side (either, when both are) decides: equal
        // exactly where it is null too.
        is_null(other_side(&l, &r))?
    } else {
        let (l, r) = unify(l, r)?;
        let raw = cmp::eq(&l, &r)?;
        let both_null = and(&is_null(&l)?, &is_null(&r)?)?;
        or(&prep_null_mask_filter(&raw), &both_null)?
    };
    wrap_bool(bools)
}

/// Element-wise null-safe inequality; the exact complement of [`equal`].
pub fn not_equal(lhs: &TypedArray, rhs: &TypedArray) -> Result<TypedArray> {
    let (l, r) = (lhs.decoded()?, rhs.decoded()?);
    check_len(&l, &r)?;
    let bools = if has_null_type(&l) || has_null_type(&r) {
        not(&is_null(other_side(&l, &r))?)?
    } else {
        let (l, r) = unify(l, r)?;
        let raw = cmp::neq(&l, &r)?;
        let l_null = is_null(&l)?;
        let r_null = is_null(&r)?;
        let one_null = and(&or(&l_null, &r_null)?, &not(&and(&l_null, &r_null)?)?)?;
        or(&prep_null_mask_filter(&raw), &one_null)?
    };
    wrap_bool(bools)
}

/// Null-safe equality of a column against one scalar comparand.
///
/// A null comparand is the unboxed null: the result is the column's own
/// null mask (null equals null, values do not).
pub fn equal_scalar(lhs: &TypedArray, rhs: &Value) -> Result<TypedArray> {
    let l = lhs.decoded()?;
    let bools = match rhs {
        Value::Null => is_null(&l)?,
        _ if has_null_type(&l) => BooleanArray::from(vec![false; l.len()]),
        _ => {
            let (l, scalar) = unify(l, scalar_comparand(rhs)?)?;
            let raw = cmp::eq(&l, &Scalar::new(scalar))?;
            // Column nulls are exactly-one-null positions.
            prep_null_mask_filter(&raw)
        }
    };
    wrap_bool(bools)
}

/// Null-safe inequality of a column against one scalar comparand.
pub fn not_equal_scalar(lhs: &TypedArray, rhs: &Value) -> Result<TypedArray> {
    let l = lhs.decoded()?;
    let bools = match rhs {
        Value::Null => not(&is_null(&l)?)?,
        _ if has_null_type(&l) => BooleanArray::from(vec![true; l.len()]),
        _ => {
            let (l, scalar) = unify(l, scalar_comparand(rhs)?)?;
            let raw = cmp::neq(&l, &Scalar::new(scalar))?;
            or(&prep_null_mask_filter(&raw), &is_null(&l)?)?
        }
    };
    wrap_bool(bools)
}

fn check_len(l: &ArrayRef, r: &ArrayRef) -> Result<()> {
    if l.len() != r.len() {
        return Err(Error::InvalidArgument(format!(
            "cannot compare arrays of length {} and {}",
            l.len(),
            r.len()
        )));
    }
    Ok(())
}

fn has_null_type(arr: &ArrayRef) -> bool {
    arr.data_type() == &DataType::Null
}

fn other_side<'a>(l: &'a ArrayRef, r: &'a ArrayRef) -> &'a ArrayRef {
    if has_null_type(l) { r } else { l }
}

/// One-element array holding the comparand in its natural encoding.
fn scalar_comparand(value: &Value) -> Result<ArrayRef> {
    build_array(std::slice::from_ref(value), &value.ty())
}

/// Reconcile the physical types of two comparison sides.
///
/// Mixed Int64/Float64 widens to Float64 (never the lossy direction); any
/// other mismatch casts the right side, surfacing an Arrow error when no
/// cast exists.
fn unify(l: ArrayRef, r: ArrayRef) -> Result<(ArrayRef, ArrayRef)> {
    let lt = l.data_type().clone();
    let rt = r.data_type().clone();
    if lt == rt {
        return Ok((l, r));
    }
    if lt == DataType::Int64 && rt == DataType::Float64 {
        let widened = compute::cast(&l, &DataType::Float64)?;
        return Ok((widened, r));
    }
    if lt == DataType::Float64 && rt == DataType::Int64 {
        let widened = compute::cast(&r, &DataType::Float64)?;
        return Ok((l, widened));
    }
    let casted = compute::cast(&r, &lt)?;
    Ok((l, casted))
}

fn wrap_bool(bools: BooleanArray) -> Result<TypedArray> {
    TypedArray::try_new(Arc::new(bools), Type::BOOL)
}
