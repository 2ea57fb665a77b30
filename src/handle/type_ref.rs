//! Serializable type references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A persisted reference to a slot type: a single type-name string.
///
/// Serializes transparently as that string, so a stored handle is just
/// `"my_app::Selection"` in JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRef {
    full_name: String,
}

impl TypeRef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
        }
    }

    /// Reference `T` by its Rust type name.
    pub fn of<T: ?Sized>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    /// The stored identifier, e.g. `core::option::Option<alloc::string::String>`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Display name with module paths stripped, e.g. `Option<String>`.
    pub fn short_name(&self) -> String {
        short_type_name(&self.full_name)
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.trim().is_empty()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Strip the module path of every identifier in a type name.
pub fn short_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut path = String::new();
    for ch in full_name.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            path.push(ch);
        } else {
            push_last_segment(&mut out, &path);
            path.clear();
            out.push(ch);
        }
    }
    push_last_segment(&mut out, &path);
    out
}

fn push_last_segment(out: &mut String, path: &str) {
    out.push_str(path.rsplit("::").next().unwrap_or(path));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name_strips_paths() {
        assert_eq!(short_type_name("alloc::string::String"), "String");
        assert_eq!(
            short_type_name("core::option::Option<alloc::string::String>"),
            "Option<String>"
        );
        assert_eq!(
            short_type_name("std::collections::hash::map::HashMap<u8, alloc::vec::Vec<i32>>"),
            "HashMap<u8, Vec<i32>>"
        );
        assert_eq!(short_type_name("(u8, my_app::Point)"), "(u8, Point)");
        assert_eq!(short_type_name("i64"), "i64");
    }

    #[test]
    fn test_of_uses_type_name() {
        let type_ref = TypeRef::of::<Option<String>>();
        assert_eq!(type_ref.full_name(), std::any::type_name::<Option<String>>());
        assert_eq!(type_ref.short_name(), "Option<String>");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let type_ref = TypeRef::new("my_app::Selection");
        let json = serde_json::to_string(&type_ref).unwrap();
        assert_eq!(json, "\"my_app::Selection\"");
        let back: TypeRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, type_ref);
        assert_eq!(back.to_string(), "my_app::Selection");
    }

    #[test]
    fn test_empty() {
        assert!(TypeRef::default().is_empty());
        assert!(TypeRef::new("  ").is_empty());
        assert!(!TypeRef::from("u8").is_empty());
    }
}
