//! Instance snapshot repository: save, load, delete with cascades.

use auditlog_core::entity::{Entity, Inheritance, PkKind};
use auditlog_core::enums::{LogAction, OnDelete};
use auditlog_core::errors::CoreError;
use auditlog_core::field::FieldKind;
use auditlog_core::instance::Instance;
use auditlog_core::log_entry::LogEntry;
use auditlog_core::value::{FieldValue, PkValue};
use chrono::Utc;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::service::AuditService;

fn row_to_instance(row: &libsql::Row, entity: &str) -> Result<Instance, DatabaseError> {
    let data = row.get::<String>(0)?;
    let instance: Instance = serde_json::from_str(&data)
        .map_err(|e| DatabaseError::Query(format!("Invalid snapshot of {entity}: {e}")))?;
    Ok(instance.with_entity(entity))
}

impl AuditService {
    /// Persist `instance` and log the change.
    ///
    /// Missing keys, `auto_now` timestamps, generated UUIDs and declared
    /// defaults are filled in before validation. The first save of a key
    /// logs `Create`; later saves log `Update` when a tracked field changed.
    /// Returns the instance as stored.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` if the instance does not fit its entity,
    /// `DatabaseError::NotFound` if a relation points at a missing instance,
    /// or `DatabaseError` if a query fails.
    pub async fn save(&self, mut instance: Instance) -> Result<Instance, DatabaseError> {
        let entity = self.schema().entity(instance.entity())?;

        let pk = match entity.pk_of(&instance) {
            Some(pk) => {
                if let Some(n) = pk.as_indexable() {
                    self.db()
                        .bump_sequence(&self.sequence_root(entity)?, n)
                        .await?;
                }
                pk
            }
            None => self.generate_pk(entity).await?,
        };
        instance.set(entity.pk_name(), entity.pk_value(&pk));
        fill_auto_values(entity, &mut instance, &pk);

        entity.complete_defaults(&mut instance)?;
        entity.validate(&instance)?;
        self.check_references(entity, &instance).await?;

        let old = self.find(entity.name(), &pk).await?;
        let data = serde_json::to_string(&instance).map_err(|e| DatabaseError::Other(e.into()))?;
        self.db()
            .execute(
                "INSERT INTO objects (entity, pk, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity, pk) DO UPDATE SET data = excluded.data, updated_at = datetime('now')",
                libsql::params![entity.concrete_name(), pk.to_string(), data],
            )
            .await?;
        tracing::debug!(entity = entity.name(), pk = %pk, created = old.is_none(), "saved snapshot");
        self.store_ancestors(entity, &instance, &pk).await?;

        match &old {
            None => {
                self.log_action(entity, &instance, LogAction::Create, None, Some(&instance))
                    .await?;
            }
            Some(old) => {
                self.log_action(entity, &instance, LogAction::Update, Some(old), Some(&instance))
                    .await?;
            }
        }
        Ok(instance)
    }

    /// Load the stored instance of `entity` with key `pk`, if any.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the entity is unknown or the query fails.
    pub async fn find(&self, entity: &str, pk: &PkValue) -> Result<Option<Instance>, DatabaseError> {
        let entity = self.schema().entity(entity)?;
        let mut rows = self
            .db()
            .query(
                "SELECT data FROM objects WHERE entity = ?1 AND pk = ?2",
                libsql::params![entity.concrete_name(), pk.to_string()],
            )
            .await?;
        rows.next()
            .await?
            .map(|row| row_to_instance(&row, entity.name()))
            .transpose()
    }

    /// Load the stored instance of `entity` with key `pk`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if there is none.
    pub async fn get(&self, entity: &str, pk: &PkValue) -> Result<Instance, DatabaseError> {
        self.find(entity, pk)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: entity.to_string(),
                pk: pk.to_string(),
            })
    }

    /// Every stored instance of `entity`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the entity is unknown or the query fails.
    pub async fn list(&self, entity: &str) -> Result<Vec<Instance>, DatabaseError> {
        let entity = self.schema().entity(entity)?;
        let mut rows = self
            .db()
            .query(
                "SELECT data FROM objects WHERE entity = ?1 ORDER BY rowid",
                [entity.concrete_name()],
            )
            .await?;
        let mut instances = Vec::new();
        while let Some(row) = rows.next().await? {
            instances.push(row_to_instance(&row, entity.name())?);
        }
        Ok(instances)
    }

    /// Delete an instance and log it, cascading to instances that reference it.
    ///
    /// `Cascade` references are deleted (and logged), `SetNull` references
    /// are cleared (and logged as updates). When the entity's history field
    /// has `delete_related`, the instance's earlier history is removed before
    /// the `Delete` entry is written. Returns the deleted instance.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no such instance is stored.
    pub async fn delete(&self, entity: &str, pk: &PkValue) -> Result<Instance, DatabaseError> {
        let entity_def = self.schema().entity(entity)?;
        let instance = self.get(entity, pk).await?;
        self.delete_instance(entity_def, instance).await
    }

    /// Log that an instance was read, for registries that track access.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no such instance is stored.
    pub async fn access(&self, entity: &str, pk: &PkValue) -> Result<Vec<LogEntry>, DatabaseError> {
        let entity_def = self.schema().entity(entity)?;
        let instance = self.get(entity, pk).await?;
        self.log_action(entity_def, &instance, LogAction::Access, Some(&instance), Some(&instance))
            .await
    }

    pub(crate) async fn delete_instance(
        &self,
        entity: &Entity,
        instance: Instance,
    ) -> Result<Instance, DatabaseError> {
        let pk = entity.pk_of(&instance).ok_or_else(|| {
            DatabaseError::InvalidState(format!("{} instance has no key", entity.name()))
        })?;
        let target = FieldValue::Ref(pk.clone());

        for (referrer, field) in self.schema().referencing(entity.name()) {
            let Some(on_delete) = field.on_delete() else {
                continue;
            };
            for related in self.list(referrer.name()).await? {
                if *related.value(&field.name) != target {
                    continue;
                }
                if referrer.concrete_name() == entity.concrete_name()
                    && referrer.pk_of(&related).as_ref() == Some(&pk)
                {
                    continue;
                }
                match on_delete {
                    OnDelete::Cascade => {
                        Box::pin(self.delete_instance(referrer, related)).await?;
                    }
                    OnDelete::SetNull => {
                        let mut related = related;
                        related.set(field.name.clone(), FieldValue::Null);
                        self.save(related).await?;
                    }
                    OnDelete::DoNothing => {}
                }
            }
        }

        self.db()
            .execute(
                "DELETE FROM objects WHERE entity = ?1 AND pk = ?2",
                libsql::params![entity.concrete_name(), pk.to_string()],
            )
            .await?;
        tracing::debug!(entity = entity.name(), pk = %pk, "deleted snapshot");

        if let Inheritance::MultiTable { parent } = entity.inheritance() {
            let parent = self.schema().concrete(parent)?;
            if let Some(row) = self.find(parent.name(), &pk).await? {
                Box::pin(self.delete_instance(parent, row)).await?;
            }
        }

        if entity.history().is_some_and(|h| h.delete_related) {
            let removed = self
                .delete_history(&entity.content_type(), &pk.to_string())
                .await?;
            tracing::debug!(entity = entity.name(), pk = %pk, removed, "deleted related history");
        }

        self.log_action(entity, &instance, LogAction::Delete, Some(&instance), None)
            .await?;
        Ok(instance)
    }

    /// Write the row of every multi-table ancestor of `entity`: the
    /// ancestor's own fields under the shared key. Ancestor rows are not
    /// logged on save.
    async fn store_ancestors(
        &self,
        entity: &Entity,
        instance: &Instance,
        pk: &PkValue,
    ) -> Result<(), DatabaseError> {
        let mut current = entity;
        while let Inheritance::MultiTable { parent } = current.inheritance() {
            let parent = self.schema().concrete(parent)?;
            let mut row = Instance::new(parent.name());
            for field in parent.concrete_fields() {
                if let Some(value) = instance.get(&field.name) {
                    row.set(field.name.clone(), value.clone());
                }
            }
            row.set(parent.pk_name(), parent.pk_value(pk));

            let data = serde_json::to_string(&row).map_err(|e| DatabaseError::Other(e.into()))?;
            self.db()
                .execute(
                    "INSERT INTO objects (entity, pk, data) VALUES (?1, ?2, ?3)
                     ON CONFLICT(entity, pk) DO UPDATE SET data = excluded.data, updated_at = datetime('now')",
                    libsql::params![parent.concrete_name(), pk.to_string(), data],
                )
                .await?;
            tracing::debug!(entity = parent.name(), pk = %pk, child = entity.name(), "saved ancestor row");
            current = parent;
        }
        Ok(())
    }

    /// Name of the counter that hands out integer keys: shared by a
    /// multi-table child and its ancestors.
    fn sequence_root(&self, entity: &Entity) -> Result<String, DatabaseError> {
        let mut current = self.schema().concrete(entity.name())?;
        while let Inheritance::MultiTable { parent } = current.inheritance() {
            current = self.schema().concrete(parent)?;
        }
        Ok(current.name().to_string())
    }

    async fn generate_pk(&self, entity: &Entity) -> Result<PkValue, DatabaseError> {
        let missing = || {
            DatabaseError::Core(CoreError::MissingValue {
                entity: entity.name().to_string(),
                field: entity.pk_name().to_string(),
            })
        };
        let generated = entity
            .pk_field()
            .is_some_and(|f| f.is_auto() || f.is_parent_link());
        if !generated {
            return Err(missing());
        }
        match entity.pk_kind() {
            PkKind::Int => Ok(PkValue::Int(
                self.db().next_sequence(&self.sequence_root(entity)?).await?,
            )),
            PkKind::Uuid => Ok(PkValue::Uuid(Uuid::new_v4())),
            PkKind::Str => Err(missing()),
        }
    }

    /// Foreign keys must point at stored instances.
    async fn check_references(&self, entity: &Entity, instance: &Instance) -> Result<(), DatabaseError> {
        for field in entity.concrete_fields() {
            if field.is_parent_link() {
                continue;
            }
            let Some(to) = field.related_target() else {
                continue;
            };
            let value = instance.value(&field.name);
            let target = self.schema().entity(to)?;
            if !value.fits_reference(target.pk_kind()) {
                return Err(DatabaseError::Core(CoreError::TypeMismatch {
                    entity: entity.name().to_string(),
                    field: field.name.clone(),
                    expected: format!("{:?} key of {to}", target.pk_kind()),
                }));
            }
            let FieldValue::Ref(key) = value else {
                continue;
            };
            // A self reference to the instance being saved is allowed.
            if to == entity.name() && entity.pk_of(instance).as_ref() == Some(key) {
                continue;
            }
            if self.find(to, key).await?.is_none() {
                return Err(DatabaseError::NotFound {
                    entity: to.to_string(),
                    pk: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Set values the storage layer owns: `auto_now` timestamps on every save,
/// generated UUIDs and inherited integer keys when unset.
fn fill_auto_values(entity: &Entity, instance: &mut Instance, pk: &PkValue) {
    let now = FieldValue::datetime(&Utc::now());
    for field in entity.concrete_fields() {
        if field.name == entity.pk_name() {
            continue;
        }
        match &field.kind {
            FieldKind::DateTime { auto_now: true } => instance.set(field.name.clone(), now.clone()),
            FieldKind::Uuid {
                auto_generate: true,
            } if !instance.contains(&field.name) => {
                instance.set(field.name.clone(), FieldValue::Uuid(Uuid::new_v4()));
            }
            FieldKind::AutoInteger if !instance.contains(&field.name) => {
                if let Some(n) = pk.as_indexable() {
                    instance.set(field.name.clone(), n);
                }
            }
            _ => {}
        }
    }
}
