//! Type lookup by name across loaded extension units.

use crate::loader::ExtensionAssembly;

/// Direct type lookup, tried before scanning extension units.
pub trait TypeLookup {
    /// Whether `name` resolves without consulting extension units.
    fn lookup(&self, name: &str) -> bool;
}

impl<F> TypeLookup for F
where
    F: Fn(&str) -> bool,
{
    fn lookup(&self, name: &str) -> bool {
        self(name)
    }
}

/// Result of [`resolve_type`].
#[derive(Debug, PartialEq, Eq)]
pub enum TypeResolution<'a> {
    /// Resolved by the direct lookup.
    Direct,
    /// Exported by this unit.
    Unit(&'a ExtensionAssembly),
    /// Not found anywhere.
    NotFound,
}

/// Resolve a type name: direct lookup first, then the first loaded unit
/// that exports it. Failed units are skipped.
pub fn resolve_type<'a>(
    name: &str,
    direct: &dyn TypeLookup,
    units: &'a [ExtensionAssembly],
) -> TypeResolution<'a> {
    if direct.lookup(name) {
        return TypeResolution::Direct;
    }

    units
        .iter()
        .find(|unit| unit.exports().iter().any(|export| export == name))
        .map_or(TypeResolution::NotFound, TypeResolution::Unit)
}
