//! The self-describing schemas every catalogue carries regardless of discovery output
//! (§4.E): `schema`, `error`, `collection`, `subscribe`, `count`, `apiRoot`.
use steve_core::schema::ApiSchema;

/// The fixed set of builtin schema ids, merged in ahead of discovered types.
pub const BUILTIN_IDS: &[&str] = &["schema", "error", "collection", "subscribe", "count", "apiRoot"];

/// Every builtin schema, Get-only and with no backing GVK — [`AccessControl::can_do`]
/// treats an empty `resource` as "fall back to method-set checks" specifically so these
/// are always reachable regardless of RBAC.
pub fn builtin_schemas() -> Vec<ApiSchema> {
    BUILTIN_IDS.iter().map(|id| ApiSchema::builtin(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_id_produces_a_get_only_schema() {
        let schemas = builtin_schemas();
        assert_eq!(schemas.len(), BUILTIN_IDS.len());
        assert!(schemas.iter().all(|s| !s.has_no_methods()));
    }
}
