//! Materializing literal values into Arrow arrays and reading them back.
//!
//! [`build_array`] lowers a slice of [`Value`]s into the physical encoding
//! for a logical [`Type`]; [`TypedArray::value`] / [`TypedArray::to_values`]
//! do the reverse. Null values lower into validity-bitmap nulls whatever the
//! declared optionality, so a column of a non-optional type can still ferry
//! nulls introduced by an enclosing row being null.
//!
//! Extraction accepts the encodings `Type::from_arrow` recognizes, including
//! wider integer and large-offset variants supplied by callers wrapping
//! foreign Arrow data.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryBuilder, BooleanArray, Float64Array, Int64Array, ListArray,
    NullArray, StringArray, StructArray, UInt64Array,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::compute;
use arrow::datatypes::{
    DataType, Field, Fields, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};

use lace_result::{Error, Result};
use lace_types::{ArtifactId, AssetRef, Type, Value, asset_struct_fields, non_none};

use crate::TypedArray;

impl TypedArray {
    /// Materialize literal rows into a typed column.
    pub fn from_values(ty: Type, values: &[Value]) -> Result<TypedArray> {
        let data = build_array(values, &ty)?;
        TypedArray::try_new(data, ty)
    }

    /// The literal value at `row`, decoding dictionaries as needed.
    pub fn value(&self, row: usize) -> Result<Value> {
        if row >= self.len() {
            return Err(Error::InvalidArgument(format!(
                "row {} out of bounds for array of {}",
                row,
                self.len()
            )));
        }
        let data = self.decoded()?;
        value_at(&data, self.ty(), row)
    }

    /// All rows as literal values.
    pub fn to_values(&self) -> Result<Vec<Value>> {
        let data = self.decoded()?;
        (0..self.len()).map(|row| value_at(&data, self.ty(), row)).collect()
    }
}

/// Lower `values` into the physical encoding of logical type `ty`.
///
/// Rows must fit the (non-optional form of the) type; `Value::Null` rows
/// become validity nulls everywhere. Types without a single encoding (`Any`,
/// heterogeneous unions) cannot be materialized.
pub fn build_array(values: &[Value], ty: &Type) -> Result<ArrayRef> {
    let base = non_none(ty);
    match &base {
        Type::None => Ok(Arc::new(NullArray::new(values.len()))),
        Type::Primitive(p) => build_primitive(values, *p, ty),
        Type::Domain(_) => build_assets(values, ty),
        Type::TypedDict(dict) => build_struct_rows(values, dict, ty),
        Type::List(elem) => build_list(values, elem, ty),
        Type::Any | Type::Union(_) => Err(Error::InvalidArgument(format!(
            "type {} has no single columnar encoding",
            ty
        ))),
    }
}

fn row_mismatch(row: usize, value: &Value, ty: &Type) -> Error {
    Error::InvalidArgument(format!(
        "row {}: cannot materialize {} into {}",
        row,
        value.type_name(),
        ty
    ))
}

fn build_primitive(values: &[Value], p: lace_types::Primitive, ty: &Type) -> Result<ArrayRef> {
    use lace_types::Primitive;
    match p {
        Primitive::Bool => {
            let mut out: Vec<Option<bool>> = Vec::with_capacity(values.len());
            for (row, v) in values.iter().enumerate() {
                out.push(match v {
                    Value::Null => None,
                    Value::Bool(b) => Some(*b),
                    other => return Err(row_mismatch(row, other, ty)),
                });
            }
            Ok(Arc::new(BooleanArray::from(out)))
        }
        Primitive::Int => {
            let mut out: Vec<Option<i64>> = Vec::with_capacity(values.len());
            for (row, v) in values.iter().enumerate() {
                out.push(match v {
                    Value::Null => None,
                    Value::Int(i) => Some(*i),
                    other => return Err(row_mismatch(row, other, ty)),
                });
            }
            Ok(Arc::new(Int64Array::from(out)))
        }
        Primitive::Float => {
            let mut out: Vec<Option<f64>> = Vec::with_capacity(values.len());
            for (row, v) in values.iter().enumerate() {
                out.push(match v {
                    Value::Null => None,
                    Value::Float(x) => Some(*x),
                    // Int literals widen into float columns.
                    Value::Int(i) => Some(*i as f64),
                    other => return Err(row_mismatch(row, other, ty)),
                });
            }
            Ok(Arc::new(Float64Array::from(out)))
        }
        Primitive::Text => {
            let mut out: Vec<Option<String>> = Vec::with_capacity(values.len());
            for (row, v) in values.iter().enumerate() {
                out.push(match v {
                    Value::Null => None,
                    Value::Text(s) => Some(s.clone()),
                    other => return Err(row_mismatch(row, other, ty)),
                });
            }
            Ok(Arc::new(StringArray::from(out)))
        }
        Primitive::Bytes => {
            let mut builder = BinaryBuilder::new();
            for (row, v) in values.iter().enumerate() {
                match v {
                    Value::Null => builder.append_null(),
                    Value::Bytes(b) => builder.append_value(b),
                    other => return Err(row_mismatch(row, other, ty)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
    }
}

fn build_assets(values: &[Value], ty: &Type) -> Result<ArrayRef> {
    let mut artifacts: Vec<u64> = Vec::with_capacity(values.len());
    let mut paths: Vec<String> = Vec::with_capacity(values.len());
    let mut validity: Vec<bool> = Vec::with_capacity(values.len());
    for (row, v) in values.iter().enumerate() {
        match v {
            Value::Null => {
                artifacts.push(0);
                paths.push(String::new());
                validity.push(false);
            }
            Value::Asset(asset) => {
                artifacts.push(asset.artifact.into());
                paths.push(asset.path.clone());
                validity.push(true);
            }
            other => return Err(row_mismatch(row, other, ty)),
        }
    }
    let nulls = validity
        .iter()
        .any(|valid| !valid)
        .then(|| NullBuffer::from(validity));
    let children: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(artifacts)),
        Arc::new(StringArray::from(paths)),
    ];
    let arr = StructArray::try_new(asset_struct_fields(), children, nulls)?;
    Ok(Arc::new(arr))
}

fn build_struct_rows(
    values: &[Value],
    dict: &lace_types::TypedDict,
    ty: &Type,
) -> Result<ArrayRef> {
    let mut validity: Vec<bool> = Vec::with_capacity(values.len());
    for (row, v) in values.iter().enumerate() {
        match v {
            Value::Null => validity.push(false),
            Value::Dict(_) => validity.push(true),
            other => return Err(row_mismatch(row, other, ty)),
        }
    }
    let mut fields: Vec<Field> = Vec::with_capacity(dict.fields.len());
    let mut children: Vec<ArrayRef> = Vec::with_capacity(dict.fields.len());
    for declared in &dict.fields {
        let mut column: Vec<Value> = Vec::with_capacity(values.len());
        for v in values {
            match v {
                Value::Dict(pairs) => column.push(
                    pairs
                        .iter()
                        .find(|(name, _)| name == &declared.name)
                        .map(|(_, field_value)| field_value.clone())
                        .unwrap_or(Value::Null),
                ),
                _ => column.push(Value::Null),
            }
        }
        let child = build_array(&column, &declared.ty)?;
        // Fields are declared nullable: enclosing null rows ferry nulls into
        // children regardless of the field's own optionality.
        fields.push(Field::new(&declared.name, child.data_type().clone(), true));
        children.push(child);
    }
    let nulls = validity
        .iter()
        .any(|valid| !valid)
        .then(|| NullBuffer::from(validity));
    let arr = StructArray::try_new(Fields::from(fields), children, nulls)?;
    Ok(Arc::new(arr))
}

fn build_list(values: &[Value], elem: &Type, ty: &Type) -> Result<ArrayRef> {
    let mut flat: Vec<Value> = Vec::new();
    let mut lengths: Vec<usize> = Vec::with_capacity(values.len());
    let mut validity: Vec<bool> = Vec::with_capacity(values.len());
    for (row, v) in values.iter().enumerate() {
        match v {
            Value::Null => {
                lengths.push(0);
                validity.push(false);
            }
            Value::List(items) => {
                flat.extend(items.iter().cloned());
                lengths.push(items.len());
                validity.push(true);
            }
            other => return Err(row_mismatch(row, other, ty)),
        }
    }
    let child = build_array(&flat, elem)?;
    let field = Arc::new(Field::new("item", child.data_type().clone(), true));
    let offsets = OffsetBuffer::<i32>::from_lengths(lengths);
    let nulls = validity
        .iter()
        .any(|valid| !valid)
        .then(|| NullBuffer::from(validity));
    let arr = ListArray::try_new(field, offsets, child, nulls)?;
    Ok(Arc::new(arr))
}

/// The literal value at `row` of a plain (non-dictionary) array.
fn value_at(data: &ArrayRef, ty: &Type, row: usize) -> Result<Value> {
    if data.data_type() == &DataType::Null || data.is_null(row) {
        return Ok(Value::Null);
    }
    let base = non_none(ty);
    match data.data_type() {
        DataType::Boolean => Ok(Value::Bool(data.as_boolean().value(row))),
        DataType::Int8 => Ok(Value::Int(data.as_primitive::<Int8Type>().value(row) as i64)),
        DataType::Int16 => Ok(Value::Int(data.as_primitive::<Int16Type>().value(row) as i64)),
        DataType::Int32 => Ok(Value::Int(data.as_primitive::<Int32Type>().value(row) as i64)),
        DataType::Int64 => Ok(Value::Int(data.as_primitive::<Int64Type>().value(row))),
        DataType::UInt8 => Ok(Value::Int(data.as_primitive::<UInt8Type>().value(row) as i64)),
        DataType::UInt16 => Ok(Value::Int(
            data.as_primitive::<UInt16Type>().value(row) as i64
        )),
        DataType::UInt32 => Ok(Value::Int(
            data.as_primitive::<UInt32Type>().value(row) as i64
        )),
        DataType::UInt64 => {
            let raw = data.as_primitive::<UInt64Type>().value(row);
            i64::try_from(raw).map(Value::Int).map_err(|_| {
                Error::InvalidArgument(format!("row {}: {} exceeds the int range", row, raw))
            })
        }
        DataType::Float32 => Ok(Value::Float(
            data.as_primitive::<Float32Type>().value(row) as f64
        )),
        DataType::Float64 => Ok(Value::Float(data.as_primitive::<Float64Type>().value(row))),
        DataType::Utf8 => Ok(Value::Text(data.as_string::<i32>().value(row).to_string())),
        DataType::LargeUtf8 => Ok(Value::Text(data.as_string::<i64>().value(row).to_string())),
        DataType::Binary => Ok(Value::Bytes(data.as_binary::<i32>().value(row).to_vec())),
        DataType::LargeBinary => Ok(Value::Bytes(data.as_binary::<i64>().value(row).to_vec())),
        DataType::Struct(_) => struct_value_at(data.as_struct(), &base, row),
        DataType::List(field) => {
            let elems = data.as_list::<i32>().value(row);
            list_value(&elems, &base, field.data_type())
        }
        DataType::LargeList(field) => {
            let elems = data.as_list::<i64>().value(row);
            list_value(&elems, &base, field.data_type())
        }
        DataType::Dictionary(_, _) => Err(Error::Internal(
            "value extraction reached an undecoded dictionary".to_string(),
        )),
        other => Err(Error::InvalidArgument(format!(
            "no value extraction for arrays of {}",
            other
        ))),
    }
}

fn struct_value_at(arr: &StructArray, base: &Type, row: usize) -> Result<Value> {
    if base == &Type::ASSET {
        let artifact = arr
            .column_by_name("artifact")
            .ok_or_else(|| Error::ArrayEncoding("asset array without artifact column".into()))?
            .as_primitive::<UInt64Type>()
            .value(row);
        let path = arr
            .column_by_name("path")
            .ok_or_else(|| Error::ArrayEncoding("asset array without path column".into()))?
            .as_string::<i32>()
            .value(row)
            .to_string();
        return Ok(Value::Asset(AssetRef::new(ArtifactId(artifact), path)));
    }
    let Type::TypedDict(dict) = base else {
        return Err(Error::ArrayEncoding(format!(
            "struct array carries non-dict logical type {}",
            base
        )));
    };
    let mut fields: Vec<(String, Value)> = Vec::with_capacity(dict.fields.len());
    for declared in &dict.fields {
        let child = arr.column_by_name(&declared.name).ok_or_else(|| {
            Error::ArrayEncoding(format!("struct array missing field '{}'", declared.name))
        })?;
        let child = plain(child)?;
        fields.push((declared.name.clone(), value_at(&child, &declared.ty, row)?));
    }
    Ok(Value::Dict(fields))
}

fn list_value(elems: &ArrayRef, base: &Type, elem_dt: &DataType) -> Result<Value> {
    let elem_ty = match base {
        Type::List(elem) => (**elem).clone(),
        _ => Type::from_arrow(elem_dt).ok_or_else(|| {
            Error::ArrayEncoding(format!(
                "list array carries non-list logical type {}",
                base
            ))
        })?,
    };
    let elems = plain(elems)?;
    let mut out = Vec::with_capacity(elems.len());
    for row in 0..elems.len() {
        out.push(value_at(&elems, &elem_ty, row)?);
    }
    Ok(Value::List(out))
}

/// Decode a possibly dictionary-encoded child array.
fn plain(data: &ArrayRef) -> Result<ArrayRef> {
    match data.data_type() {
        DataType::Dictionary(_, values) => {
            let to = values.as_ref().clone();
            compute::cast(data, &to).map_err(Error::from)
        }
        _ => Ok(Arc::clone(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_round_trip() {
        let values = vec![Value::Int(1), Value::Null, Value::Int(3)];
        let arr = TypedArray::from_values(Type::optional(Type::INT), &values).unwrap();
        assert_eq!(arr.to_values().unwrap(), values);
    }

    #[test]
    fn test_int_literals_widen_into_float_columns() {
        let arr =
            TypedArray::from_values(Type::FLOAT, &[Value::Int(1), Value::Float(0.5)]).unwrap();
        assert_eq!(
            arr.to_values().unwrap(),
            vec![Value::Float(1.0), Value::Float(0.5)]
        );
    }

    #[test]
    fn test_wrong_kind_is_rejected_with_row_number() {
        let err =
            TypedArray::from_values(Type::INT, &[Value::Int(1), Value::Text("x".into())])
                .unwrap_err();
        assert!(err.to_string().contains("row 1"), "got: {err}");
    }

    #[test]
    fn test_asset_round_trip() {
        let asset = Value::Asset(AssetRef::new(ArtifactId(9), "img/cat.png"));
        let values = vec![asset.clone(), Value::Null];
        let arr = TypedArray::from_values(Type::optional(Type::ASSET), &values).unwrap();
        assert_eq!(arr.to_values().unwrap(), values);
    }

    #[test]
    fn test_dict_round_trip_with_missing_field_as_null() {
        let ty = Type::typed_dict([("a", Type::INT), ("b", Type::optional(Type::TEXT))]);
        let rows = vec![
            Value::Dict(vec![
                ("a".to_string(), Value::Int(1)),
                ("b".to_string(), Value::Text("x".to_string())),
            ]),
            Value::Dict(vec![("a".to_string(), Value::Int(2))]),
        ];
        let arr = TypedArray::from_values(Type::optional(ty), &rows).unwrap();
        let out = arr.to_values().unwrap();
        assert_eq!(
            out[1],
            Value::Dict(vec![
                ("a".to_string(), Value::Int(2)),
                ("b".to_string(), Value::Null),
            ])
        );
    }

    #[test]
    fn test_list_round_trip_preserves_null_rows() {
        let ty = Type::list(Type::optional(Type::INT));
        let rows = vec![
            Value::List(vec![Value::Int(1), Value::Null]),
            Value::Null,
            Value::List(vec![]),
        ];
        let arr = TypedArray::from_values(Type::optional(ty), &rows).unwrap();
        assert_eq!(arr.to_values().unwrap(), rows);
    }

    #[test]
    fn test_nested_dict_in_list() {
        let row_ty = Type::typed_dict([("id", Type::INT)]);
        let ty = Type::list(row_ty);
        let rows = vec![Value::List(vec![
            Value::Dict(vec![("id".to_string(), Value::Int(1))]),
            Value::Dict(vec![("id".to_string(), Value::Int(2))]),
        ])];
        let arr = TypedArray::from_values(ty, &rows).unwrap();
        assert_eq!(arr.to_values().unwrap(), rows);
    }

    #[test]
    fn test_any_cannot_be_materialized() {
        let err = TypedArray::from_values(Type::list(Type::Any), &[Value::List(vec![])])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "got: {err}");
    }
}
