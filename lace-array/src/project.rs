//! Struct-column projection and assembly.
//!
//! `pick_field` projects one declared field out of a dict-typed column and
//! `build_struct` assembles dict-typed columns from children; together they
//! are the columnar counterparts of the `pick` / `dict` graph ops. Both
//! leave child encodings alone (a dictionary-encoded text field stays
//! dictionary-encoded through assembly and projection).

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, GenericListArray, OffsetSizeTrait, StructArray};
use arrow::compute::{is_null, nullif};
use arrow::datatypes::{DataType, Field, Fields};

use lace_result::{Error, Result};
use lace_types::{AssetRef, Type, TypedDict, Value, non_none};

use crate::TypedArray;

/// Project field `name` out of a dict-typed column, or out of each element
/// of a list-of-dicts column (list offsets and validity carry over).
///
/// Rows where the enclosing dict is null project to null, whatever the
/// field's own validity says. Dictionary-encoded columns project on their
/// distinct values.
pub fn pick_field(arr: &TypedArray, name: &str) -> Result<TypedArray> {
    let base = non_none(arr.ty());
    let field_ty = match &base {
        Type::TypedDict(dict) => declared_field(dict, name, arr.ty())?.clone(),
        Type::List(elem) => match elem.as_ref() {
            Type::TypedDict(dict) => Type::list(declared_field(dict, name, arr.ty())?.clone()),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "cannot pick '{}' from column of {}",
                    name,
                    arr.ty()
                )));
            }
        },
        _ => {
            return Err(Error::InvalidArgument(format!(
                "cannot pick '{}' from column of {}",
                name,
                arr.ty()
            )));
        }
    };
    let out_ty = if arr.ty().is_optional() {
        Type::optional(field_ty)
    } else {
        field_ty
    };
    arr.map_values(out_ty, |values| match values.data_type() {
        DataType::List(_) => project_list_child(values.as_list::<i32>(), name),
        DataType::LargeList(_) => project_list_child(values.as_list::<i64>(), name),
        _ => project_struct_child(values, name),
    })
}

fn declared_field<'t>(dict: &'t TypedDict, name: &str, column_ty: &Type) -> Result<&'t Type> {
    dict.field(name).ok_or_else(|| {
        Error::InvalidArgument(format!("no field '{}' in column of {}", name, column_ty))
    })
}

fn project_struct_child(values: &ArrayRef, name: &str) -> Result<ArrayRef> {
    let structs = values
        .as_any()
        .downcast_ref::<StructArray>()
        .ok_or_else(|| {
            Error::ArrayEncoding(format!(
                "dict-typed column backed by {} array",
                values.data_type()
            ))
        })?;
    let child = structs
        .column_by_name(name)
        .ok_or_else(|| Error::ArrayEncoding(format!("struct array missing field '{}'", name)))?;
    if structs.null_count() > 0 {
        // Enclosing-row nulls surface in the projected column.
        nullif(child, &is_null(structs)?).map_err(Error::from)
    } else {
        Ok(Arc::clone(child))
    }
}

/// Same offsets and row validity, element structs swapped for one child.
fn project_list_child<O: OffsetSizeTrait>(
    list: &GenericListArray<O>,
    name: &str,
) -> Result<ArrayRef> {
    let child = project_struct_child(list.values(), name)?;
    let field = Arc::new(Field::new("item", child.data_type().clone(), true));
    let out =
        GenericListArray::<O>::try_new(field, list.offsets().clone(), child, list.nulls().cloned())?;
    Ok(Arc::new(out))
}

/// Assemble a dict-typed column from named children of equal length.
pub fn build_struct(fields: &[(String, TypedArray)]) -> Result<TypedArray> {
    let Some(((_, first), rest)) = fields.split_first() else {
        return Err(Error::InvalidArgument(
            "cannot assemble a dict column from no fields".to_string(),
        ));
    };
    for (name, child) in rest {
        if child.len() != first.len() {
            return Err(Error::InvalidArgument(format!(
                "dict field '{}' has {} rows, expected {}",
                name,
                child.len(),
                first.len()
            )));
        }
    }
    let mut arrow_fields: Vec<Field> = Vec::with_capacity(fields.len());
    let mut children: Vec<ArrayRef> = Vec::with_capacity(fields.len());
    let mut ty_fields: Vec<(String, Type)> = Vec::with_capacity(fields.len());
    for (name, child) in fields {
        arrow_fields.push(Field::new(name, child.data().data_type().clone(), true));
        children.push(Arc::clone(child.data()));
        ty_fields.push((name.clone(), child.ty().clone()));
    }
    let arr = StructArray::try_new(Fields::from(arrow_fields), children, None)?;
    TypedArray::try_new(Arc::new(arr), Type::typed_dict(ty_fields))
}

/// Extract per-row asset references from an asset-typed column.
pub fn asset_refs(arr: &TypedArray) -> Result<Vec<Option<AssetRef>>> {
    if non_none(arr.ty()) != Type::ASSET {
        return Err(Error::InvalidArgument(format!(
            "expected an asset column, got {}",
            arr.ty()
        )));
    }
    arr.to_values()?
        .into_iter()
        .map(|v| match v {
            Value::Null => Ok(None),
            Value::Asset(asset) => Ok(Some(asset)),
            other => Err(Error::ArrayEncoding(format!(
                "asset column produced a {} value",
                other.type_name()
            ))),
        })
        .collect()
}
