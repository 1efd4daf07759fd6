//! Per-registry flags and per-entity tracking options.

use std::collections::{BTreeMap, BTreeSet};

use auditlog_core::entity::Entity;
use auditlog_core::enums::LogAction;
use auditlog_core::field::FieldDef;
use auditlog_core::schema::Schema;
use auditlog_core::tracking::TrackingOptions;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Actions a registry logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFlags {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub access: bool,
    pub m2m: bool,
}

impl Default for RegistryFlags {
    fn default() -> Self {
        Self {
            create: true,
            update: true,
            delete: true,
            access: true,
            m2m: true,
        }
    }
}

impl RegistryFlags {
    #[must_use]
    pub const fn allows(&self, action: LogAction) -> bool {
        match action {
            LogAction::Create => self.create,
            LogAction::Update => self.update,
            LogAction::Delete => self.delete,
            LogAction::Access => self.access,
        }
    }
}

/// Options passed to [`AuditlogRegistry::register`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationOptions {
    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    pub mapping_fields: BTreeMap<String, String>,
    pub mask_fields: Vec<String>,
    pub m2m_fields: Vec<String>,
}

impl RegistrationOptions {
    #[must_use]
    pub fn include<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn mapping(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.mapping_fields.insert(field.into(), label.into());
        self
    }

    #[must_use]
    pub fn mask<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn m2m<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.m2m_fields.extend(fields.into_iter().map(Into::into));
        self
    }
}

/// Controls [`AuditlogRegistry::register_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllModelsOptions {
    /// Entity names left unregistered.
    pub exclude_models: BTreeSet<String>,
    /// Also register auto-created many-to-many through entities.
    pub include_auto_created: bool,
}

/// A named set of registrations and the actions logged for them.
#[derive(Debug, Clone)]
pub struct AuditlogRegistry {
    name: String,
    flags: RegistryFlags,
    global_exclude: BTreeSet<String>,
    global_mask: BTreeSet<String>,
    registry: BTreeMap<String, TrackingOptions>,
}

impl AuditlogRegistry {
    /// A registry logging every action.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_flags(name, RegistryFlags::default())
    }

    #[must_use]
    pub fn with_flags(name: impl Into<String>, flags: RegistryFlags) -> Self {
        Self {
            name: name.into(),
            flags,
            global_exclude: BTreeSet::new(),
            global_mask: BTreeSet::new(),
            registry: BTreeMap::new(),
        }
    }

    /// Field names excluded from, and masked in, every registration made
    /// after this call.
    #[must_use]
    pub fn with_global_fields<E, M>(mut self, exclude: E, mask: M) -> Self
    where
        E: IntoIterator<Item = String>,
        M: IntoIterator<Item = String>,
    {
        self.global_exclude.extend(exclude);
        self.global_mask.extend(mask);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn flags(&self) -> RegistryFlags {
        self.flags
    }

    /// Register `entity`, replacing any earlier registration of it.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownField` when an option names a field the
    /// entity has no snapshot field for, `NotManyToMany` when `m2m_fields`
    /// names another kind of field, and `ConflictingFieldOptions` when a field
    /// is both included and excluded.
    pub fn register(
        &mut self,
        entity: &Entity,
        options: RegistrationOptions,
    ) -> Result<(), RegistryError> {
        check_snapshot_fields(entity, &options.include_fields, "include_fields")?;
        check_snapshot_fields(entity, &options.exclude_fields, "exclude_fields")?;
        check_snapshot_fields(entity, &options.mask_fields, "mask_fields")?;
        check_snapshot_fields(entity, options.mapping_fields.keys(), "mapping_fields")?;

        for field in &options.m2m_fields {
            match entity.field(field) {
                Some(f) if f.is_many_to_many() => {}
                Some(_) => {
                    return Err(RegistryError::NotManyToMany {
                        entity: entity.name().to_string(),
                        field: field.clone(),
                    });
                }
                None => {
                    return Err(RegistryError::UnknownField {
                        entity: entity.name().to_string(),
                        field: field.clone(),
                        option: "m2m_fields",
                    });
                }
            }
        }

        if let Some(field) = options
            .include_fields
            .iter()
            .find(|f| options.exclude_fields.contains(*f))
        {
            return Err(RegistryError::ConflictingFieldOptions {
                entity: entity.name().to_string(),
                field: field.clone(),
            });
        }

        let tracking = TrackingOptions {
            include_fields: options.include_fields.into_iter().collect(),
            exclude_fields: options
                .exclude_fields
                .into_iter()
                .chain(self.global_exclude.iter().cloned())
                .collect(),
            mapping_fields: options.mapping_fields,
            mask_fields: options
                .mask_fields
                .into_iter()
                .chain(self.global_mask.iter().cloned())
                .collect(),
            m2m_fields: options.m2m_fields.into_iter().collect(),
        };

        if self
            .registry
            .insert(entity.name().to_string(), tracking)
            .is_some()
        {
            tracing::debug!(registry = %self.name, entity = entity.name(), "replaced registration");
        } else {
            tracing::debug!(registry = %self.name, entity = entity.name(), "registered");
        }
        Ok(())
    }

    /// Register every entity of `schema` with default options, skipping
    /// `exclude_models` and, unless asked for, auto-created through entities.
    /// Returns how many entities were registered.
    ///
    /// # Errors
    ///
    /// Propagates registration errors; default options never produce any.
    pub fn register_all(
        &mut self,
        schema: &Schema,
        options: &AllModelsOptions,
    ) -> Result<usize, RegistryError> {
        let mut count = 0;
        for entity in schema.entities() {
            if options.exclude_models.contains(entity.name())
                || (entity.is_auto_created() && !options.include_auto_created)
            {
                continue;
            }
            self.register(entity, RegistrationOptions::default())?;
            count += 1;
        }
        Ok(count)
    }

    /// Remove the registration of `entity`. Returns whether it was registered.
    pub fn unregister(&mut self, entity: &str) -> bool {
        let removed = self.registry.remove(entity).is_some();
        if removed {
            tracing::debug!(registry = %self.name, entity, "unregistered");
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, entity: &str) -> bool {
        self.registry.contains_key(entity)
    }

    /// Registered entity names, sorted.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }

    /// Tracking options of a registered entity.
    #[must_use]
    pub fn get_model_fields(&self, entity: &str) -> Option<&TrackingOptions> {
        self.registry.get(entity)
    }

    /// Tracking options of a registered entity.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotRegistered` when `entity` is not registered.
    pub fn tracking(&self, entity: &str) -> Result<&TrackingOptions, RegistryError> {
        self.get_model_fields(entity)
            .ok_or_else(|| RegistryError::NotRegistered(entity.to_string()))
    }

    /// Whether `action` on `entity` produces a log entry in this registry.
    #[must_use]
    pub fn should_log(&self, action: LogAction, entity: &str) -> bool {
        self.flags.allows(action) && self.contains(entity)
    }

    /// Whether changes to the many-to-many `field` of `entity` are logged.
    #[must_use]
    pub fn tracks_m2m(&self, entity: &str, field: &str) -> bool {
        self.flags.m2m
            && self
                .registry
                .get(entity)
                .is_some_and(|options| options.m2m_fields.contains(field))
    }
}

/// Every named field must be a snapshot (non many-to-many) field of `entity`.
fn check_snapshot_fields<'a>(
    entity: &Entity,
    fields: impl IntoIterator<Item = &'a String>,
    option: &'static str,
) -> Result<(), RegistryError> {
    for field in fields {
        if !entity.field(field).is_some_and(FieldDef::is_concrete) {
            return Err(RegistryError::UnknownField {
                entity: entity.name().to_string(),
                field: field.clone(),
                option,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_core::entity::EntityDef;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn schema() -> Schema {
        Schema::build([
            EntityDef::new("app", "Other"),
            EntityDef::new("app", "Item")
                .field(FieldDef::char("label", 100))
                .field(FieldDef::text("text").blank())
                .field(FieldDef::many_to_many("others", "Other")),
        ])
        .unwrap()
    }

    #[test]
    fn register_and_query() {
        let schema = schema();
        let mut registry = AuditlogRegistry::new("audit");
        registry
            .register(
                schema.entity("Item").unwrap(),
                RegistrationOptions::default()
                    .include(["label"])
                    .mapping("label", "Label")
                    .m2m(["others"]),
            )
            .unwrap();

        assert!(registry.contains("Item"));
        assert!(!registry.contains("Other"));
        assert_eq!(registry.models().collect::<Vec<_>>(), vec!["Item"]);

        let options = registry.get_model_fields("Item").unwrap();
        assert!(options.include_fields.contains("label"));
        assert_eq!(options.mapped_label("label"), Some("Label"));
        assert!(registry.tracks_m2m("Item", "others"));
        assert!(registry.should_log(LogAction::Update, "Item"));
        assert!(!registry.should_log(LogAction::Update, "Other"));
    }

    #[test]
    fn reregistering_replaces_options() {
        let schema = schema();
        let entity = schema.entity("Item").unwrap();
        let mut registry = AuditlogRegistry::new("audit");
        registry
            .register(entity, RegistrationOptions::default().exclude(["text"]))
            .unwrap();
        registry
            .register(entity, RegistrationOptions::default())
            .unwrap();
        assert!(registry.get_model_fields("Item").unwrap().exclude_fields.is_empty());
    }

    #[test]
    fn unregister_removes_entity() {
        let schema = schema();
        let mut registry = AuditlogRegistry::new("audit");
        registry
            .register(schema.entity("Item").unwrap(), RegistrationOptions::default())
            .unwrap();
        assert!(registry.unregister("Item"));
        assert!(!registry.unregister("Item"));
        assert!(registry.tracking("Item").is_err());
    }

    #[rstest]
    #[case::unknown_include(RegistrationOptions::default().include(["missing"]))]
    #[case::unknown_mask(RegistrationOptions::default().mask(["missing"]))]
    #[case::unknown_mapping(RegistrationOptions::default().mapping("missing", "Missing"))]
    #[case::m2m_in_exclude(RegistrationOptions::default().exclude(["others"]))]
    fn unknown_fields_are_rejected(#[case] options: RegistrationOptions) {
        let schema = schema();
        let mut registry = AuditlogRegistry::new("audit");
        let err = registry
            .register(schema.entity("Item").unwrap(), options)
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownField { .. }), "{err}");
    }

    #[test]
    fn m2m_fields_must_be_many_to_many() {
        let schema = schema();
        let mut registry = AuditlogRegistry::new("audit");
        let err = registry
            .register(
                schema.entity("Item").unwrap(),
                RegistrationOptions::default().m2m(["label"]),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotManyToMany { .. }));
    }

    #[test]
    fn include_and_exclude_conflict() {
        let schema = schema();
        let mut registry = AuditlogRegistry::new("audit");
        let err = registry
            .register(
                schema.entity("Item").unwrap(),
                RegistrationOptions::default()
                    .include(["label"])
                    .exclude(["label"]),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::ConflictingFieldOptions { .. }));
    }

    #[test]
    fn global_fields_merge_into_registrations() {
        let schema = schema();
        let mut registry = AuditlogRegistry::new("audit")
            .with_global_fields(["text".to_string()], ["label".to_string()]);
        registry
            .register(schema.entity("Item").unwrap(), RegistrationOptions::default())
            .unwrap();
        let options = registry.get_model_fields("Item").unwrap();
        assert!(options.exclude_fields.contains("text"));
        assert!(options.is_masked("label"));
    }

    #[test]
    fn flags_gate_actions() {
        let schema = schema();
        let mut registry = AuditlogRegistry::with_flags(
            "m2m_only",
            RegistryFlags {
                create: false,
                update: false,
                delete: false,
                ..RegistryFlags::default()
            },
        );
        registry
            .register(
                schema.entity("Item").unwrap(),
                RegistrationOptions::default().m2m(["others"]),
            )
            .unwrap();
        assert!(!registry.should_log(LogAction::Create, "Item"));
        assert!(!registry.should_log(LogAction::Delete, "Item"));
        assert!(registry.should_log(LogAction::Access, "Item"));
        assert!(registry.tracks_m2m("Item", "others"));
    }

    #[test]
    fn register_all_skips_excluded_and_auto_created() {
        let schema = schema();
        let mut registry = AuditlogRegistry::new("audit");
        let options = AllModelsOptions {
            exclude_models: BTreeSet::from(["Other".to_string()]),
            include_auto_created: false,
        };
        assert_eq!(registry.register_all(&schema, &options).unwrap(), 1);
        assert_eq!(registry.models().collect::<Vec<_>>(), vec!["Item"]);

        let mut everything = AuditlogRegistry::new("audit");
        let options = AllModelsOptions {
            include_auto_created: true,
            ..AllModelsOptions::default()
        };
        everything.register_all(&schema, &options).unwrap();
        assert!(everything.contains("Item_others"));
    }
}
