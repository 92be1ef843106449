//! Mapping between flat key/value data (decoded JSON) and typed models.
//!
//! # Design
//! A model is a struct of optional fields declared with [`model!`]. The macro
//! generates a name-based accessor/mutator dispatch (`get_field` /
//! `set_field`) and the field table; [`Model::from_flat`] and
//! [`Model::to_flat`] walk that table. Unknown input keys are ignored and
//! unset fields are simply absent from the flat output.
//!
//! Each field type converts through [`FieldCodec`]. Nested models come in
//! two shapes decided by the raw value: a list (a JSON array, or an object
//! keyed `"0".."n-1"`) becomes [`Nested::Many`], anything else
//! [`Nested::One`].
//!
//! [`model!`]: crate::model!

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};
use crate::naming;

/// Conversion of one field value to and from its flat form.
pub trait FieldCodec: Sized {
    /// Decode a raw, non-null value. The error is a human-readable reason.
    fn decode(raw: &Value) -> std::result::Result<Self, String>;

    /// Flat form of the value, `Ok(None)` when it has none.
    fn encode(&self) -> Result<Option<Value>>;
}

/// A typed entity with a declared field set and a flat mapping.
pub trait Model: Default {
    /// Type name used in error messages.
    const NAME: &'static str;
    /// Declared field names in declaration order.
    const FIELDS: &'static [&'static str];

    /// Mutator dispatch: decode `raw` and assign it to `field`.
    /// Unknown field names are ignored.
    fn set_field(&mut self, field: &'static str, raw: &Value) -> Result<()>;

    /// Accessor dispatch: flat value of `field`, `None` when unset.
    fn get_field(&self, field: &'static str) -> Result<Option<Value>>;

    fn from_flat(data: &Map<String, Value>) -> Result<Self> {
        let mut model = Self::default();
        for &field in Self::FIELDS {
            if let Some(raw) = data.get(field).filter(|v| !v.is_null()) {
                model.set_field(field, raw)?;
            }
        }
        Ok(model)
    }

    /// Like [`Model::from_flat`] for a value that must be a JSON object.
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(data) => Self::from_flat(data),
            other => Err(Error::MalformedInput(format!(
                "{} expects an object, got {}",
                Self::NAME,
                json_type(other)
            ))),
        }
    }

    fn to_flat(&self) -> Result<Map<String, Value>> {
        let mut flat = Map::new();
        for &field in Self::FIELDS {
            if let Some(value) = self.get_field(field)? {
                flat.insert(field.to_string(), value);
            }
        }
        Ok(flat)
    }

    /// Declared field names, for callers that do not know the concrete type.
    fn parameters() -> &'static [&'static str] {
        Self::FIELDS
    }

    /// `(getter, setter)` names paired with each declared field.
    fn accessors() -> Vec<(String, String)> {
        Self::FIELDS
            .iter()
            .map(|f| (naming::accessor_name(f), naming::mutator_name(f)))
            .collect()
    }
}

/// A nested model field: one object or a list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<M> {
    One(M),
    /// `None` entries stand for null elements and are skipped on output.
    Many(Vec<Option<M>>),
}

impl<M> Nested<M> {
    pub fn one(&self) -> Option<&M> {
        match self {
            Nested::One(m) => Some(m),
            Nested::Many(_) => None,
        }
    }

    /// Non-null elements; a single model yields itself.
    pub fn iter(&self) -> impl Iterator<Item = &M> {
        let (one, many) = match self {
            Nested::One(m) => (Some(m), None),
            Nested::Many(items) => (None, Some(items.iter().flatten())),
        };
        one.into_iter().chain(many.into_iter().flatten())
    }
}

impl<M: Model> FieldCodec for Nested<M> {
    fn decode(raw: &Value) -> std::result::Result<Self, String> {
        if let Some(items) = list_items(raw) {
            let models = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Null => Ok(None),
                    Value::Object(data) => M::from_flat(data)
                        .map(Some)
                        .map_err(|e| format!("item {i}: {e}")),
                    other => Err(format!("item {i}: expected {} data, got {}", M::NAME, json_type(other))),
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(Nested::Many(models));
        }
        match raw {
            Value::Object(data) => M::from_flat(data).map(Nested::One).map_err(|e| e.to_string()),
            other => Err(format!("expected {} data, got {}", M::NAME, json_type(other))),
        }
    }

    fn encode(&self) -> Result<Option<Value>> {
        match self {
            Nested::One(model) => Ok(Some(Value::Object(model.to_flat()?))),
            Nested::Many(items) => {
                let mut flat = Vec::with_capacity(items.len());
                for model in items.iter().flatten() {
                    flat.push(Value::Object(model.to_flat()?));
                }
                Ok(Some(Value::Array(flat)))
            }
        }
    }
}

/// Elements of `raw` when it is shaped like a list.
///
/// Objects count as lists when their keys are exactly `"0".."n-1"`, in any
/// order; elements are returned by index.
pub fn list_items(raw: &Value) -> Option<Vec<&Value>> {
    match raw {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(map) => {
            let mut slots: Vec<Option<&Value>> = vec![None; map.len()];
            for (key, value) in map {
                let canonical = key.bytes().all(|b| b.is_ascii_digit())
                    && !(key.len() > 1 && key.starts_with('0'));
                if !canonical {
                    return None;
                }
                let index: usize = key.parse().ok()?;
                let slot = slots.get_mut(index)?;
                *slot = Some(value);
            }
            slots.into_iter().collect()
        }
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

macro_rules! serde_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldCodec for $ty {
                fn decode(raw: &Value) -> std::result::Result<Self, String> {
                    <$ty as serde::Deserialize>::deserialize(raw).map_err(|e| e.to_string())
                }

                fn encode(&self) -> Result<Option<Value>> {
                    Ok(serde_json::to_value(self).ok())
                }
            }
        )*
    };
}

serde_codec!(String, bool, i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FieldCodec for f64 {
    fn decode(raw: &Value) -> std::result::Result<Self, String> {
        raw.as_f64()
            .ok_or_else(|| format!("expected a number, got {}", json_type(raw)))
    }

    /// Integral values within `i64` range are written as integers, so an
    /// amount read as `12` goes back out as `12`.
    fn encode(&self) -> Result<Option<Value>> {
        let v = *self;
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            return Ok(Some(Value::Number(Number::from(v as i64))));
        }
        Ok(Number::from_f64(v).map(Value::Number))
    }
}

impl FieldCodec for Value {
    fn decode(raw: &Value) -> std::result::Result<Self, String> {
        Ok(raw.clone())
    }

    fn encode(&self) -> Result<Option<Value>> {
        Ok(Some(self.clone()))
    }
}

impl FieldCodec for Map<String, Value> {
    fn decode(raw: &Value) -> std::result::Result<Self, String> {
        raw.as_object()
            .cloned()
            .ok_or_else(|| format!("expected an object, got {}", json_type(raw)))
    }

    fn encode(&self) -> Result<Option<Value>> {
        Ok(Some(Value::Object(self.clone())))
    }
}

impl<T: FieldCodec> FieldCodec for Option<T> {
    fn decode(raw: &Value) -> std::result::Result<Self, String> {
        match raw {
            Value::Null => Ok(None),
            other => T::decode(other).map(Some),
        }
    }

    fn encode(&self) -> Result<Option<Value>> {
        match self {
            None => Ok(Some(Value::Null)),
            Some(value) => value.encode(),
        }
    }
}

impl<T: FieldCodec> FieldCodec for Vec<T> {
    fn decode(raw: &Value) -> std::result::Result<Self, String> {
        let items = list_items(raw).ok_or_else(|| format!("expected a list, got {}", json_type(raw)))?;
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| T::decode(item).map_err(|e| format!("item {i}: {e}")))
            .collect()
    }

    fn encode(&self) -> Result<Option<Value>> {
        let mut flat = Vec::with_capacity(self.len());
        for item in self {
            match item.encode()? {
                None => return Ok(None),
                Some(Value::Null) => {}
                Some(value) => flat.push(value),
            }
        }
        Ok(Some(Value::Array(flat)))
    }
}

#[doc(hidden)]
pub mod __private {
    pub use serde_json::{Map, Value};
}

/// Declare a model struct.
///
/// Every field is stored as `Option<T>` where `T: FieldCodec`; the macro
/// derives `Debug`, `Clone`, `Default` and `PartialEq` and implements
/// [`Model`] plus [`FieldCodec`] so the model can nest inside others.
///
/// ```ignore
/// gateway_core::model! {
///     pub struct Card {
///         pub card_number: String,
///         pub expiry_month: u32,
///     }
/// }
/// ```
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: ::std::option::Option<$ty>,
            )*
        }

        impl $crate::model::Model for $name {
            const NAME: &'static str = ::std::stringify!($name);
            const FIELDS: &'static [&'static str] = &[$(::std::stringify!($field)),*];

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                field: &'static str,
                raw: &$crate::model::__private::Value,
            ) -> $crate::Result<()> {
                match field {
                    $(
                        ::std::stringify!($field) => {
                            let value = <$ty as $crate::model::FieldCodec>::decode(raw).map_err(
                                |reason| $crate::Error::InvalidField {
                                    model: <Self as $crate::model::Model>::NAME,
                                    field,
                                    reason,
                                },
                            )?;
                            self.$field = ::std::option::Option::Some(value);
                        }
                    )*
                    _ => {}
                }
                ::std::result::Result::Ok(())
            }

            fn get_field(
                &self,
                field: &'static str,
            ) -> $crate::Result<::std::option::Option<$crate::model::__private::Value>> {
                match field {
                    $(
                        ::std::stringify!($field) => match &self.$field {
                            ::std::option::Option::None => ::std::result::Result::Ok(::std::option::Option::None),
                            ::std::option::Option::Some(value) => {
                                match $crate::model::FieldCodec::encode(value)? {
                                    ::std::option::Option::Some(flat) => {
                                        ::std::result::Result::Ok(::std::option::Option::Some(flat))
                                    }
                                    ::std::option::Option::None => {
                                        ::std::result::Result::Err($crate::Error::UnsupportedConversion {
                                            model: <Self as $crate::model::Model>::NAME,
                                            field,
                                        })
                                    }
                                }
                            }
                        },
                    )*
                    _ => ::std::result::Result::Ok(::std::option::Option::None),
                }
            }
        }

        impl $crate::model::FieldCodec for $name {
            fn decode(
                raw: &$crate::model::__private::Value,
            ) -> ::std::result::Result<Self, ::std::string::String> {
                match raw {
                    $crate::model::__private::Value::Object(data) => {
                        <Self as $crate::model::Model>::from_flat(data).map_err(|e| e.to_string())
                    }
                    _ => ::std::result::Result::Err(::std::format!(
                        "expected {} data",
                        <Self as $crate::model::Model>::NAME
                    )),
                }
            }

            fn encode(
                &self,
            ) -> $crate::Result<::std::option::Option<$crate::model::__private::Value>> {
                let flat = <Self as $crate::model::Model>::to_flat(self)?;
                ::std::result::Result::Ok(::std::option::Option::Some(
                    $crate::model::__private::Value::Object(flat),
                ))
            }
        }
    };
}
