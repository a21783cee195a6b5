//! Rendering list columns as delimited strings.
//!
//! Join keys cannot be nested list columns, so the comparison-safety rewrite
//! lowers lists into their delimited string rendering; this module is the
//! columnar kernel behind that rewrite. Elements render via Arrow's cast to
//! text, null elements render as the empty string, and a null list row stays
//! null.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, GenericListArray, OffsetSizeTrait, StringArray};
use arrow::compute;
use arrow::datatypes::DataType;

use lace_result::{Error, Result};
use lace_types::{Type, non_none};

use crate::TypedArray;

/// Join each list row's elements into one string with `delimiter` between
/// elements.
pub fn join_to_str(arr: &TypedArray, delimiter: &str) -> Result<TypedArray> {
    let base = non_none(arr.ty());
    if !matches!(base, Type::List(_)) {
        return Err(Error::InvalidArgument(format!(
            "cannot join column of {} into strings",
            arr.ty()
        )));
    }
    let out_ty = if arr.ty().is_optional() {
        Type::optional(Type::TEXT)
    } else {
        Type::TEXT
    };
    let data = arr.decoded()?;
    let joined = match data.data_type() {
        DataType::List(_) => join_rows(data.as_list::<i32>(), delimiter)?,
        DataType::LargeList(_) => join_rows(data.as_list::<i64>(), delimiter)?,
        other => {
            return Err(Error::ArrayEncoding(format!(
                "list-typed column backed by {} array",
                other
            )));
        }
    };
    let mut out = TypedArray::try_new(Arc::new(joined), out_ty)?;
    if let Some(artifact) = arr.artifact() {
        out = out.with_artifact(artifact);
    }
    Ok(out)
}

fn join_rows<O: OffsetSizeTrait>(
    list: &GenericListArray<O>,
    delimiter: &str,
) -> Result<StringArray> {
    // One cast for the whole child array, then slice per row by offset.
    let rendered = compute::cast(list.values(), &DataType::Utf8)?;
    let rendered = rendered.as_string::<i32>();
    let offsets = list.value_offsets();
    let mut out: Vec<Option<String>> = Vec::with_capacity(list.len());
    for row in 0..list.len() {
        if list.is_null(row) {
            out.push(None);
            continue;
        }
        let start = offsets[row].as_usize();
        let end = offsets[row + 1].as_usize();
        let mut joined = String::new();
        for idx in start..end {
            if idx > start {
                joined.push_str(delimiter);
            }
            if rendered.is_valid(idx) {
                joined.push_str(rendered.value(idx));
            }
        }
        out.push(Some(joined));
    }
    Ok(StringArray::from(out))
}
