//! Typed columnar arrays for lace.
//!
//! A [`TypedArray`] pairs a native Arrow array with the logical [`Type`] of
//! its elements and an optional [`ArtifactId`] naming the storage the data
//! came from. The logical type describes the *decoded* element: a
//! dictionary-encoded column of strings is still `Text`, and every consumer
//! here treats the encoding as a physical detail.
//!
//! ## Dictionary transparency
//!
//! [`TypedArray::map_values`] runs a value-level transform once per distinct
//! dictionary entry and re-wraps the result with the original index mapping,
//! so low-cardinality columns pay per-distinct-value instead of per-row.
//! Kernels that need to see every row as-is (the comparisons in [`cmp`])
//! decode first via [`TypedArray::decoded`]; both routes produce element-wise
//! identical decoded results.
//!
//! ## Submodules
//!
//! - [`cmp`]: null-safe `equal` / `not_equal` over arrays and scalars.
//! - [`project`]: struct-column field projection and assembly.
//! - [`strings`]: list-to-delimited-string rendering.
//! - [`convert`]: materializing literal values into arrays and back.

#![forbid(unsafe_code)]

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute;
use arrow::datatypes::DataType;
use tracing::trace;

use lace_result::{Error, Result};
use lace_types::{ArtifactId, Type};

pub mod cmp;
pub mod convert;
pub mod project;
pub mod strings;

/// A typed columnar array: Arrow data plus the logical element type and an
/// optional backing-artifact key.
///
/// The artifact key is a non-owning reference resolved through an artifact
/// store; dropping the array never releases the artifact and the artifact's
/// absence only surfaces when a lazy sub-value is actually fetched.
#[derive(Debug, Clone)]
pub struct TypedArray {
    data: ArrayRef,
    ty: Type,
    artifact: Option<ArtifactId>,
}

impl TypedArray {
    /// Wrap `data` with logical type `ty`, validating that the physical
    /// encoding (after dictionary decode) can carry the type.
    pub fn try_new(data: ArrayRef, ty: Type) -> Result<Self> {
        if let Some(expected) = ty.arrow_type() {
            let actual = decoded_type(data.data_type());
            if !encoding_matches(&expected, actual) {
                return Err(Error::ArrayEncoding(format!(
                    "array of {} cannot carry logical type {} (expects {})",
                    data.data_type(),
                    ty,
                    expected
                )));
            }
        }
        Ok(Self {
            data,
            ty,
            artifact: None,
        })
    }

    /// Record the artifact this array's data was loaded from.
    pub fn with_artifact(mut self, artifact: ArtifactId) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn data(&self) -> &ArrayRef {
        &self.data
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn artifact(&self) -> Option<ArtifactId> {
        self.artifact
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Apply a value-level transform, transparently handling dictionary
    /// encoding: for a dictionary array the transform runs on the distinct
    /// values and the result is re-wrapped with the original indices.
    ///
    /// The transform must be element-wise (`n` values in, `n` values out);
    /// anything that reorders or resizes would corrupt the index mapping and
    /// is rejected.
    pub fn map_values<F>(&self, out_ty: Type, op: F) -> Result<TypedArray>
    where
        F: Fn(&ArrayRef) -> Result<ArrayRef>,
    {
        if let Some(dict) = self.data.as_any_dictionary_opt() {
            let values = dict.values();
            let mapped = op(values)?;
            if mapped.len() != values.len() {
                return Err(Error::ArrayEncoding(format!(
                    "dictionary transform changed value count from {} to {}",
                    values.len(),
                    mapped.len()
                )));
            }
            trace!(
                distinct = values.len(),
                rows = self.data.len(),
                "transform ran on dictionary values"
            );
            let rewrapped = dict.with_values(mapped);
            let mut out = TypedArray::try_new(rewrapped, out_ty)?;
            out.artifact = self.artifact;
            Ok(out)
        } else {
            let mut out = TypedArray::try_new(op(&self.data)?, out_ty)?;
            out.artifact = self.artifact;
            Ok(out)
        }
    }

    /// The array with dictionary encoding removed; plain arrays are returned
    /// as-is (cheap handle clone).
    pub fn decoded(&self) -> Result<ArrayRef> {
        match self.data.data_type() {
            DataType::Dictionary(_, values) => {
                let to = values.as_ref().clone();
                compute::cast(&self.data, &to).map_err(Error::from)
            }
            _ => Ok(Arc::clone(&self.data)),
        }
    }
}

/// The value type seen after dictionary decode.
fn decoded_type(dt: &DataType) -> &DataType {
    match dt {
        DataType::Dictionary(_, values) => values,
        other => other,
    }
}

/// Structural encoding compatibility, ignoring field nullability and
/// accepting large-offset variants where the logical encoding is the small
/// form. Dictionary encodings at any nesting depth match on their value
/// type.
fn encoding_matches(expected: &DataType, actual: &DataType) -> bool {
    if let DataType::Dictionary(_, actual_values) = actual {
        return encoding_matches(expected, actual_values);
    }
    match (expected, actual) {
        (DataType::Struct(e), DataType::Struct(a)) => {
            e.len() == a.len()
                && e.iter().zip(a.iter()).all(|(ef, af)| {
                    ef.name() == af.name() && encoding_matches(ef.data_type(), af.data_type())
                })
        }
        (DataType::List(e), DataType::List(a)) | (DataType::List(e), DataType::LargeList(a)) => {
            encoding_matches(e.data_type(), a.data_type())
        }
        (DataType::Utf8, DataType::LargeUtf8) => true,
        (DataType::Binary, DataType::LargeBinary) => true,
        _ => expected == actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{DictionaryArray, Int64Array, StringArray};
    use arrow::datatypes::Int32Type;

    fn text_dict() -> ArrayRef {
        let keys = arrow::array::Int32Array::from(vec![Some(0), Some(1), None, Some(0)]);
        let values = Arc::new(StringArray::from(vec!["tag", "note"]));
        Arc::new(DictionaryArray::<Int32Type>::try_new(keys, values).unwrap())
    }

    #[test]
    fn test_try_new_accepts_matching_encoding() {
        let data: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
        let arr = TypedArray::try_new(data, Type::INT).unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.ty(), &Type::INT);
    }

    #[test]
    fn test_try_new_rejects_mismatched_encoding() {
        let data: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
        let err = TypedArray::try_new(data, Type::TEXT).unwrap_err();
        assert!(matches!(err, Error::ArrayEncoding(_)), "got: {err}");
    }

    #[test]
    fn test_dictionary_validates_against_value_type() {
        let arr = TypedArray::try_new(text_dict(), Type::TEXT).unwrap();
        assert_eq!(arr.len(), 4);
        let err = TypedArray::try_new(text_dict(), Type::INT).unwrap_err();
        assert!(matches!(err, Error::ArrayEncoding(_)), "got: {err}");
    }

    #[test]
    fn test_optional_type_shares_the_plain_encoding() {
        let data: ArrayRef = Arc::new(Int64Array::from(vec![Some(1), None]));
        let arr = TypedArray::try_new(data, Type::optional(Type::INT)).unwrap();
        assert_eq!(arr.ty(), &Type::optional(Type::INT));
    }

    #[test]
    fn test_decoded_unwraps_dictionary() {
        let arr = TypedArray::try_new(text_dict(), Type::TEXT).unwrap();
        let plain = arr.decoded().unwrap();
        let strings = plain.as_string::<i32>();
        assert_eq!(strings.value(0), "tag");
        assert_eq!(strings.value(1), "note");
        assert!(strings.is_null(2));
        assert_eq!(strings.value(3), "tag");
    }

    #[test]
    fn test_map_values_runs_once_per_distinct_value() {
        let arr = TypedArray::try_new(text_dict(), Type::TEXT).unwrap();
        let mapped = arr
            .map_values(Type::INT, |values| {
                let strings = values.as_string::<i32>();
                let lens: Int64Array = strings
                    .iter()
                    .map(|s| s.map(|s| s.len() as i64))
                    .collect();
                Ok(Arc::new(lens) as ArrayRef)
            })
            .unwrap();
        // Still dictionary-encoded, same row count, new logical type.
        assert!(mapped.data().as_any_dictionary_opt().is_some());
        assert_eq!(mapped.len(), 4);
        assert_eq!(mapped.ty(), &Type::INT);

        let decoded = mapped.decoded().unwrap();
        let ints = decoded.as_primitive::<arrow::datatypes::Int64Type>();
        assert_eq!(ints.value(0), 3);
        assert_eq!(ints.value(1), 4);
        assert!(ints.is_null(2));
        assert_eq!(ints.value(3), 3);
    }

    #[test]
    fn test_map_values_matches_decoded_path() {
        let arr = TypedArray::try_new(text_dict(), Type::TEXT).unwrap();
        let op = |values: &ArrayRef| -> Result<ArrayRef> {
            let strings = values.as_string::<i32>();
            let lens: Int64Array = strings
                .iter()
                .map(|s| s.map(|s| s.len() as i64))
                .collect();
            Ok(Arc::new(lens) as ArrayRef)
        };
        let via_dict = arr.map_values(Type::INT, op).unwrap();
        let plain = TypedArray::try_new(arr.decoded().unwrap(), Type::TEXT).unwrap();
        let via_plain = plain.map_values(Type::INT, op).unwrap();
        assert_eq!(
            via_dict.decoded().unwrap().as_ref(),
            via_plain.decoded().unwrap().as_ref()
        );
    }

    #[test]
    fn test_map_values_rejects_resizing_transform() {
        let arr = TypedArray::try_new(text_dict(), Type::TEXT).unwrap();
        let err = arr
            .map_values(Type::TEXT, |values| {
                Ok(values.slice(0, values.len() - 1))
            })
            .unwrap_err();
        assert!(matches!(err, Error::ArrayEncoding(_)), "got: {err}");
    }
}
