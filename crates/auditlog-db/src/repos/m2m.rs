//! Many-to-many link management.
//!
//! Each link is an instance of the field's auto-created through entity, so
//! link creation and removal are logged like any other save or delete when
//! the through entity is registered. Symmetrical self-relations store both
//! directions.

use auditlog_core::entity::Entity;
use auditlog_core::enums::M2mOperation;
use auditlog_core::errors::CoreError;
use auditlog_core::instance::Instance;
use auditlog_core::schema::ThroughInfo;
use auditlog_core::value::{FieldValue, PkValue};

use crate::error::DatabaseError;
use crate::service::AuditService;

impl AuditService {
    fn through_of(&self, owner: &Entity, field: &str) -> Result<&ThroughInfo, DatabaseError> {
        self.schema().through(owner.name(), field).ok_or_else(|| {
            DatabaseError::Core(CoreError::UnknownField {
                entity: owner.name().to_string(),
                field: field.to_string(),
            })
        })
    }

    /// Keys linked to `pk` through the many-to-many `field` of `entity`, sorted.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` if `field` is not a many-to-many field.
    pub async fn related_keys(
        &self,
        entity: &str,
        pk: &PkValue,
        field: &str,
    ) -> Result<Vec<PkValue>, DatabaseError> {
        let owner = self.schema().entity(entity)?;
        let through = self.through_of(owner, field)?;
        let source = FieldValue::Ref(pk.clone());

        let mut keys: Vec<PkValue> = self
            .list(&through.entity)
            .await?
            .iter()
            .filter(|link| *link.value(&through.source_field) == source)
            .filter_map(|link| match link.value(&through.target_field) {
                FieldValue::Ref(key) => Some(key.clone()),
                _ => None,
            })
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Link `targets` to `pk`. Keys already linked are skipped; a log entry
    /// carrying the added objects is written when anything was added.
    /// Returns the keys that were added.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the owner or a target is not stored.
    pub async fn add_m2m(
        &self,
        entity: &str,
        pk: &PkValue,
        field: &str,
        targets: &[PkValue],
    ) -> Result<Vec<PkValue>, DatabaseError> {
        let owner_entity = self.schema().entity(entity)?;
        let through = self.through_of(owner_entity, field)?;
        let target_entity = self.schema().entity(&through.target)?;
        let owner = self.get(entity, pk).await?;
        let existing = self.related_keys(entity, pk, field).await?;

        let mut added: Vec<PkValue> = Vec::new();
        let mut objects = Vec::new();
        for target in targets {
            if existing.contains(target) || added.contains(target) {
                continue;
            }
            let target_instance = self.get(&through.target, target).await?;
            self.link(through, pk, target).await?;
            if through.symmetrical && target != pk {
                self.link(through, target, pk).await?;
            }
            objects.push(target_entity.repr_of(&target_instance));
            added.push(target.clone());
        }

        if !added.is_empty() {
            self.log_m2m(owner_entity, &owner, field, M2mOperation::Add, objects)
                .await?;
        }
        Ok(added)
    }

    /// Unlink `targets` from `pk`. Keys that were not linked are skipped; a
    /// log entry carrying the removed objects is written when anything was
    /// removed. Returns the keys that were removed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the owner is not stored.
    pub async fn remove_m2m(
        &self,
        entity: &str,
        pk: &PkValue,
        field: &str,
        targets: &[PkValue],
    ) -> Result<Vec<PkValue>, DatabaseError> {
        let owner_entity = self.schema().entity(entity)?;
        let through = self.through_of(owner_entity, field)?;
        let through_entity = self.schema().entity(&through.entity)?;
        let target_entity = self.schema().entity(&through.target)?;
        let owner = self.get(entity, pk).await?;

        let owner_ref = FieldValue::Ref(pk.clone());
        let links = self.list(&through.entity).await?;
        let mut removed: Vec<PkValue> = Vec::new();
        let mut objects = Vec::new();
        for target in targets {
            if removed.contains(target) {
                continue;
            }
            let target_ref = FieldValue::Ref(target.clone());
            let mut found = false;
            for link in &links {
                let source = link.value(&through.source_field);
                let linked = link.value(&through.target_field);
                let forward = *source == owner_ref && *linked == target_ref;
                let backward = through.symmetrical && *source == target_ref && *linked == owner_ref;
                if forward || backward {
                    self.delete_instance(through_entity, link.clone()).await?;
                    found |= forward;
                }
            }
            if found {
                let repr = match self.find(&through.target, target).await? {
                    Some(instance) => target_entity.repr_of(&instance),
                    None => target_entity.repr_of(
                        &Instance::new(target_entity.name())
                            .with(target_entity.pk_name(), target_entity.pk_value(target)),
                    ),
                };
                objects.push(repr);
                removed.push(target.clone());
            }
        }

        if !removed.is_empty() {
            self.log_m2m(owner_entity, &owner, field, M2mOperation::Delete, objects)
                .await?;
        }
        Ok(removed)
    }

    /// Unlink everything from `pk`. Returns the keys that were removed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the owner is not stored.
    pub async fn clear_m2m(
        &self,
        entity: &str,
        pk: &PkValue,
        field: &str,
    ) -> Result<Vec<PkValue>, DatabaseError> {
        let keys = self.related_keys(entity, pk, field).await?;
        self.remove_m2m(entity, pk, field, &keys).await
    }

    async fn link(
        &self,
        through: &ThroughInfo,
        source: &PkValue,
        target: &PkValue,
    ) -> Result<Instance, DatabaseError> {
        self.save(
            Instance::new(&through.entity)
                .with(&through.source_field, FieldValue::Ref(source.clone()))
                .with(&through.target_field, FieldValue::Ref(target.clone())),
        )
        .await
    }
}
