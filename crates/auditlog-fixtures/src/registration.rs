//! Registrations of the fixture entities.

use auditlog_core::schema::Schema;
use auditlog_registry::{AuditlogRegistry, RegistrationOptions, RegistryError, RegistryFlags};

use crate::models::{
    ADDITIONAL_DATA_INCLUDED_MODEL, ALT_PRIMARY_KEY_MODEL, CHARFIELD_TEXTFIELD_MODEL,
    CHOICES_FIELD_MODEL, DATE_TIME_FIELD_MODEL, JSON_MODEL, MANY_RELATED_MODEL,
    MANY_RELATED_RECURSIVE_THROUGH, NO_DELETE_HISTORY_MODEL, POSTGRES_ARRAY_FIELD_MODEL,
    PROXY_MODEL, RELATED_MODEL, SIMPLE_EXCLUDE_MODEL, SIMPLE_INCLUDE_MODEL, SIMPLE_MAPPING_MODEL,
    SIMPLE_MASKED_MODEL, SIMPLE_MODEL, UUID_PRIMARY_KEY_MODEL,
};

pub const DEFAULT_REGISTRY: &str = "auditlog";
pub const M2M_ONLY_REGISTRY: &str = "m2m_only";

/// Entities registered in the default registry with default options.
pub const DEFAULT_OPTION_MODELS: &[&str] = &[
    SIMPLE_MODEL,
    ALT_PRIMARY_KEY_MODEL,
    UUID_PRIMARY_KEY_MODEL,
    PROXY_MODEL,
    RELATED_MODEL,
    MANY_RELATED_MODEL,
    MANY_RELATED_RECURSIVE_THROUGH,
    ADDITIONAL_DATA_INCLUDED_MODEL,
    DATE_TIME_FIELD_MODEL,
    CHOICES_FIELD_MODEL,
    CHARFIELD_TEXTFIELD_MODEL,
    POSTGRES_ARRAY_FIELD_MODEL,
    NO_DELETE_HISTORY_MODEL,
    JSON_MODEL,
];

/// The two fixture registries.
#[derive(Debug, Clone)]
pub struct FixtureRegistries {
    /// Logs every action.
    pub auditlog: AuditlogRegistry,
    /// Logs many-to-many changes and access only.
    pub m2m_only: AuditlogRegistry,
}

impl FixtureRegistries {
    /// Both registries, default first.
    #[must_use]
    pub fn into_vec(self) -> Vec<AuditlogRegistry> {
        vec![self.auditlog, self.m2m_only]
    }
}

/// Register the fixture entities of `schema`.
///
/// # Errors
///
/// Returns `RegistryError` if `schema` lacks a fixture entity or an option
/// names a field the entity does not have.
pub fn register(schema: &Schema) -> Result<FixtureRegistries, RegistryError> {
    register_into(schema, AuditlogRegistry::new(DEFAULT_REGISTRY))
}

/// Like [`register`], but builds the default registrations on top of
/// `auditlog`, keeping its flags, global fields and earlier registrations.
///
/// # Errors
///
/// Same as [`register`].
pub fn register_into(
    schema: &Schema,
    mut auditlog: AuditlogRegistry,
) -> Result<FixtureRegistries, RegistryError> {
    for name in DEFAULT_OPTION_MODELS {
        auditlog.register(schema.entity(name)?, RegistrationOptions::default())?;
    }
    auditlog.register(
        schema.entity(SIMPLE_INCLUDE_MODEL)?,
        RegistrationOptions::default().include(["label"]),
    )?;
    auditlog.register(
        schema.entity(SIMPLE_EXCLUDE_MODEL)?,
        RegistrationOptions::default().exclude(["text"]),
    )?;
    auditlog.register(
        schema.entity(SIMPLE_MAPPING_MODEL)?,
        RegistrationOptions::default().mapping("sku", "Product No."),
    )?;
    auditlog.register(
        schema.entity(SIMPLE_MASKED_MODEL)?,
        RegistrationOptions::default().mask(["address"]),
    )?;

    let mut m2m_only = AuditlogRegistry::with_flags(
        M2M_ONLY_REGISTRY,
        RegistryFlags {
            create: false,
            update: false,
            delete: false,
            ..RegistryFlags::default()
        },
    );
    m2m_only.register(
        schema.entity(MANY_RELATED_MODEL)?,
        RegistrationOptions::default().m2m(["related"]),
    )?;

    tracing::debug!(
        auditlog = auditlog.models().count(),
        m2m_only = m2m_only.models().count(),
        "fixture registrations ready"
    );
    Ok(FixtureRegistries { auditlog, m2m_only })
}
