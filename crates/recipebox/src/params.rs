//! Runtime values for named query parameters.

use std::net::IpAddr;

use indexmap::IndexMap;
use recipebox_sql::ParamName;
use tokio_postgres::types::{IsNull, ToSql, Type};

use crate::{Error, Result};

/// A value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// `INTEGER`
    I32(i32),
    /// `BIGINT`, also used for ids.
    I64(i64),
    Text(String),
    /// `TEXT[]`, the ingredient list.
    TextArray(Vec<String>),
    /// `INET`
    Inet(IpAddr),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    String => Text,
    Vec<String> => TextArray,
    IpAddr => Inet,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Values for the named parameters of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(IndexMap<ParamName, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Params::insert`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(ParamName::from(name), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Order values by the placeholder list a rendered statement expects.
    ///
    /// Values that the statement does not reference are ignored; a
    /// referenced name with no value is an error.
    pub fn bind<'a>(&'a self, names: &[ParamName]) -> Result<Vec<SqlParam<'a>>> {
        names
            .iter()
            .map(|name| {
                self.0
                    .get(name)
                    .map(SqlParam)
                    .ok_or_else(|| Error::UnboundParam(name.to_string()))
            })
            .collect()
    }
}

/// Borrowed [`Value`] that tokio-postgres can send.
#[derive(Debug)]
pub struct SqlParam<'a>(pub &'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::I32(v) => v.to_sql(ty, out),
            Value::I64(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::TextArray(v) => v.to_sql(ty, out),
            Value::Inet(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT4
                | Type::INT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::TEXT_ARRAY
                | Type::VARCHAR_ARRAY
                | Type::INET
        )
    }

    tokio_postgres::types::to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_follows_placeholder_order() {
        let params = Params::new()
            .with("limit", 12i64)
            .with("category", "Soups");
        let names = [ParamName::from("category"), ParamName::from("limit")];
        let bound = params.bind(&names).unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[0].0, &Value::Text("Soups".into()));
        assert_eq!(bound[1].0, &Value::I64(12));
    }

    #[test]
    fn bind_ignores_unreferenced_values() {
        let params = Params::new().with("search", "%beet%").with("limit", 12i64);
        let bound = params.bind(&[ParamName::from("search")]).unwrap();
        assert_eq!(bound.len(), 1);
    }

    #[test]
    fn bind_reports_missing_values() {
        let err = Params::new().bind(&[ParamName::from("id")]).unwrap_err();
        assert!(matches!(err, Error::UnboundParam(name) if name == "id"));
    }

    #[test]
    fn option_maps_to_null() {
        assert!(Value::from(None::<String>).is_null());
        assert_eq!(Value::from(Some(3i32)), Value::I32(3));
    }
}
