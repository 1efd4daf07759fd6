//! Turning snapshot changes into log entries, once per registry.

use auditlog_core::changes::{Change, Changes, M2mChange};
use auditlog_core::diff::model_instance_diff;
use auditlog_core::entity::Entity;
use auditlog_core::enums::{LogAction, M2mOperation};
use auditlog_core::instance::{Instance, RelatedContext};
use auditlog_core::log_entry::{LogEntry, NewLogEntry};
use auditlog_core::value::FieldValue;
use serde_json::{Map, Value};

use crate::context::AuditContext;
use crate::error::DatabaseError;
use crate::service::AuditService;

impl AuditService {
    /// Log `action` on `instance` for every registry that wants it.
    ///
    /// `Create` and `Delete` are always written; an `Update` whose diff is
    /// empty is not. `Access` carries no changes.
    pub(crate) async fn log_action(
        &self,
        entity: &Entity,
        instance: &Instance,
        action: LogAction,
        old: Option<&Instance>,
        new: Option<&Instance>,
    ) -> Result<Vec<LogEntry>, DatabaseError> {
        let context = AuditContext::current();
        if context.disabled {
            return Ok(Vec::new());
        }

        let mut pending = Vec::new();
        for registry in self.registries() {
            if !registry.should_log(action, entity.name()) {
                continue;
            }
            let options = registry.tracking(entity.name())?;
            let changes = if action == LogAction::Access {
                Changes::new()
            } else {
                match model_instance_diff(old, new, entity, options)? {
                    Some(changes) => changes,
                    None if action == LogAction::Update => continue,
                    None => Changes::new(),
                }
            };
            pending.push((registry.name(), changes));
        }

        self.write_entries(entity, instance, action, &context, pending)
            .await
    }

    /// Log a many-to-many operation on `owner` as an `Update`.
    pub(crate) async fn log_m2m(
        &self,
        entity: &Entity,
        owner: &Instance,
        field: &str,
        operation: M2mOperation,
        objects: Vec<String>,
    ) -> Result<Vec<LogEntry>, DatabaseError> {
        let context = AuditContext::current();
        if context.disabled {
            return Ok(Vec::new());
        }

        let pending: Vec<(&str, Changes)> = self
            .registries()
            .iter()
            .filter(|r| r.tracks_m2m(entity.name(), field))
            .map(|r| {
                let mut changes = Changes::new();
                changes.insert(
                    field.to_string(),
                    Change::ManyToMany(M2mChange::new(operation, objects.clone())),
                );
                (r.name(), changes)
            })
            .collect();

        self.write_entries(entity, owner, LogAction::Update, &context, pending)
            .await
    }

    async fn write_entries(
        &self,
        entity: &Entity,
        instance: &Instance,
        action: LogAction,
        context: &AuditContext,
        pending: Vec<(&str, Changes)>,
    ) -> Result<Vec<LogEntry>, DatabaseError> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let pk = entity.pk_of(instance).ok_or_else(|| {
            DatabaseError::InvalidState(format!("{} instance has no key", entity.name()))
        })?;
        let additional_data = self.additional_data(entity, instance).await?;
        let content_type = entity.content_type();
        let object_repr = entity.repr_of(instance);

        let mut entries = Vec::with_capacity(pending.len());
        for (registry, changes) in pending {
            let entry = self
                .append_entry(NewLogEntry {
                    content_type: content_type.clone(),
                    object_pk: pk.to_string(),
                    object_id: pk.as_indexable(),
                    object_repr: object_repr.clone(),
                    action,
                    changes,
                    actor: context.actor.clone(),
                    remote_addr: context.remote_addr.clone(),
                    cid: context.cid.clone(),
                    additional_data: additional_data.clone(),
                })
                .await?;
            tracing::debug!(
                registry,
                content_type = %entry.content_type,
                object_pk = %entry.object_pk,
                action = action.as_str(),
                "logged change"
            );
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn additional_data(
        &self,
        entity: &Entity,
        instance: &Instance,
    ) -> Result<Option<Map<String, Value>>, DatabaseError> {
        let Some(hook) = entity.additional_data_hook() else {
            return Ok(None);
        };
        let related = self.related_context(entity, instance).await?;
        Ok(hook(instance, &related))
    }

    /// Resolve the relations of `instance` for an additional-data hook.
    async fn related_context(
        &self,
        entity: &Entity,
        instance: &Instance,
    ) -> Result<RelatedContext, DatabaseError> {
        let mut context = RelatedContext::new();
        for field in entity.fields() {
            if field.is_many_to_many() {
                if let Some(pk) = entity.pk_of(instance) {
                    let keys = self.related_keys(entity.name(), &pk, &field.name).await?;
                    context.insert_many(field.name.clone(), keys);
                }
                continue;
            }
            let (Some(to), FieldValue::Ref(key)) =
                (field.related_target(), instance.value(&field.name))
            else {
                continue;
            };
            if let Some(target) = self.find(to, key).await? {
                context.insert_related(field.name.clone(), target);
            }
        }
        Ok(context)
    }
}
