/// Globally available identifiers
///
/// Names in these tables are reachable from every compiled template, so the
/// free-variable pass never rewrites them into data or helper accesses.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Global utility functions
pub const NATIVE_FUNCTIONS: &[&str] = &[
    "decodeURI",
    "decodeURIComponent",
    "encodeURI",
    "encodeURIComponent",
    "isFinite",
    "isNaN",
    "parseInt",
    "parseFloat",
];

/// Global objects and constructors
pub const NATIVE_OBJECTS: &[&str] = &[
    "Array",
    "Boolean",
    "Date",
    "Error",
    "Function",
    "JSON",
    "Math",
    "Map",
    "Number",
    "Object",
    "RegExp",
    "String",
    "WeakMap",
    "console",
];

/// Global values that read like identifiers
pub const GLOBAL_VALUES: &[&str] = &["undefined", "NaN", "Infinity", "globalThis"];

static BUILTINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    NATIVE_FUNCTIONS
        .iter()
        .chain(NATIVE_OBJECTS)
        .chain(GLOBAL_VALUES)
        .copied()
        .collect()
});

/// Whether `name` is allow-listed and must never be rewritten
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(name)
}
