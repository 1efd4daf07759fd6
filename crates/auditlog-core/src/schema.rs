//! Schema resolution.
//!
//! `Schema::build` takes every `EntityDef` and produces resolved `Entity`
//! values:
//!
//! - concrete entities without a declared key get an `id` auto-integer key;
//! - proxies share their parent's fields, key, storage and history field;
//! - multi-table children carry the parent's fields, a `<parent>_ptr`
//!   parent-link key and their own fields;
//! - each many-to-many field gets an auto-created through entity
//!   `<Owner>_<field>` with two cascading foreign keys.

use std::collections::{BTreeMap, BTreeSet};

use crate::entity::{Entity, EntityDef, Inheritance, PkKind};
use crate::enums::OnDelete;
use crate::errors::CoreError;
use crate::field::{FieldDef, FieldKind};

/// How a many-to-many field is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughInfo {
    /// Name of the auto-created through entity.
    pub entity: String,
    /// Through field pointing at the owner.
    pub source_field: String,
    /// Through field pointing at the target.
    pub target_field: String,
    /// Target entity name.
    pub target: String,
    /// Adding `b` to `a` also adds `a` to `b`.
    pub symmetrical: bool,
}

/// The resolved set of entities.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<String, Entity>,
    through: BTreeMap<(String, String), ThroughInfo>,
}

impl Schema {
    /// Resolve a set of declarations.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` for duplicate names, unknown parents or relation
    /// targets, inheritance cycles, proxies declaring fields, or entities
    /// with more than one primary key.
    pub fn build(defs: impl IntoIterator<Item = EntityDef>) -> Result<Self, CoreError> {
        let mut declared: BTreeMap<String, EntityDef> = BTreeMap::new();
        for mut def in defs {
            resolve_self_targets(&mut def);
            if declared.contains_key(&def.name) {
                return Err(CoreError::DuplicateEntity(def.name));
            }
            declared.insert(def.name.clone(), def);
        }

        let mut resolver = Resolver {
            declared: &declared,
            resolved: BTreeMap::new(),
            visiting: BTreeSet::new(),
        };
        for name in declared.keys() {
            resolver.resolve(name)?;
        }
        let mut entities = resolver.resolved;

        for entity in entities.values() {
            for field in &entity.fields {
                if let Some(target) = field.related_target() {
                    if !entities.contains_key(target) {
                        return Err(CoreError::UnknownEntity(format!(
                            "{target} (target of {}.{})",
                            entity.name, field.name
                        )));
                    }
                }
            }
        }

        let mut through = BTreeMap::new();
        let owners: Vec<Entity> = entities
            .values()
            .filter(|e| !e.is_proxy())
            .cloned()
            .collect();
        for owner in &owners {
            for field in owner.fields.iter().filter(|f| f.is_many_to_many()) {
                let (info, entity) = through_entity(owner, field);
                if entities.contains_key(&info.entity) {
                    return Err(CoreError::DuplicateEntity(info.entity));
                }
                entities.insert(info.entity.clone(), entity);
                through.insert((owner.name.clone(), field.name.clone()), info);
            }
        }

        tracing::debug!(entities = entities.len(), "schema resolved");
        Ok(Self { entities, through })
    }

    /// Look up an entity by name.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnknownEntity` if no entity has this name.
    pub fn entity(&self, name: &str) -> Result<&Entity, CoreError> {
        self.entities
            .get(name)
            .ok_or_else(|| CoreError::UnknownEntity(name.to_string()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// The entity whose storage backs `name` (itself unless `name` is a proxy).
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnknownEntity` if either lookup fails.
    pub fn concrete(&self, name: &str) -> Result<&Entity, CoreError> {
        let entity = self.entity(name)?;
        self.entity(entity.concrete_name())
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The concrete entity recorded under a log entry's content type.
    #[must_use]
    pub fn by_content_type(&self, content_type: &str) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| !e.is_proxy() && e.content_type() == content_type)
    }

    /// Storage of a many-to-many field, looked up through proxies.
    #[must_use]
    pub fn through(&self, owner: &str, field: &str) -> Option<&ThroughInfo> {
        let concrete = self.entities.get(owner)?.concrete_name().to_string();
        self.through.get(&(concrete, field.to_string()))
    }

    /// Foreign-key and one-to-one fields (parent links excluded) of
    /// non-proxy entities that point at the storage of `target`.
    #[must_use]
    pub fn referencing(&self, target: &str) -> Vec<(&Entity, &FieldDef)> {
        let Some(target_concrete) = self.entities.get(target).map(Entity::concrete_name) else {
            return Vec::new();
        };
        let mut refs = Vec::new();
        for entity in self.entities.values().filter(|e| !e.is_proxy()) {
            for field in entity.concrete_fields() {
                if field.is_parent_link() {
                    continue;
                }
                let points_here = field
                    .related_target()
                    .and_then(|to| self.entities.get(to))
                    .is_some_and(|to| to.concrete_name() == target_concrete);
                if points_here {
                    refs.push((entity, field));
                }
            }
        }
        refs
    }
}

fn resolve_self_targets(def: &mut EntityDef) {
    let own = def.name.clone();
    for field in &mut def.fields {
        match &mut field.kind {
            FieldKind::ForeignKey { to, .. } | FieldKind::OneToOne { to, .. } if *to == "self" => {
                to.clone_from(&own);
            }
            FieldKind::ManyToMany { to, symmetrical } => {
                if *to == "self" {
                    to.clone_from(&own);
                }
                if *to == own {
                    *symmetrical = true;
                }
            }
            _ => {}
        }
    }
}

struct Resolver<'a> {
    declared: &'a BTreeMap<String, EntityDef>,
    resolved: BTreeMap<String, Entity>,
    visiting: BTreeSet<String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, name: &str) -> Result<Entity, CoreError> {
        if let Some(done) = self.resolved.get(name) {
            return Ok(done.clone());
        }
        let declared = self.declared;
        let def = declared
            .get(name)
            .ok_or_else(|| CoreError::UnknownEntity(name.to_string()))?;
        if !self.visiting.insert(name.to_string()) {
            return Err(CoreError::InvalidInheritance {
                entity: name.to_string(),
                reason: "inheritance cycle".into(),
            });
        }

        let entity = match &def.inheritance {
            Inheritance::Concrete => resolve_concrete(def)?,
            Inheritance::Proxy { parent } => {
                let parent = self.resolve_parent(def, parent)?;
                resolve_proxy(def, &parent)?
            }
            Inheritance::MultiTable { parent } => {
                let parent = self.resolve_parent(def, parent)?;
                resolve_multi_table(def, &parent)?
            }
        };

        self.visiting.remove(name);
        self.resolved.insert(name.to_string(), entity.clone());
        Ok(entity)
    }

    fn resolve_parent(&mut self, def: &EntityDef, parent: &str) -> Result<Entity, CoreError> {
        if !self.declared.contains_key(parent) {
            return Err(CoreError::InvalidInheritance {
                entity: def.name.clone(),
                reason: format!("unknown parent {parent}"),
            });
        }
        self.resolve(parent)
    }
}

fn resolve_concrete(def: &EntityDef) -> Result<Entity, CoreError> {
    let mut fields = def.fields.clone();
    let declared_keys: Vec<&FieldDef> = fields.iter().filter(|f| f.primary_key).collect();
    if declared_keys.len() > 1 {
        return Err(CoreError::Validation(format!(
            "{} declares more than one primary key",
            def.name
        )));
    }
    if declared_keys.is_empty() {
        fields.insert(0, FieldDef::auto("id"));
    }
    let pk_field = fields
        .iter()
        .find(|f| f.primary_key)
        .cloned()
        .ok_or_else(|| CoreError::Validation(format!("{} has no primary key", def.name)))?;
    let pk_kind = pk_kind_of(&def.name, &pk_field.kind)?;

    Ok(Entity {
        name: def.name.clone(),
        app_label: def.app_label.clone(),
        concrete: def.name.clone(),
        fields,
        pk: pk_field.name,
        pk_kind,
        inheritance: Inheritance::Concrete,
        history: def.history,
        additional_data: def.additional_data,
        repr: def.repr,
        auto_created: def.auto_created,
    })
}

fn resolve_proxy(def: &EntityDef, parent: &Entity) -> Result<Entity, CoreError> {
    if !def.fields.is_empty() {
        return Err(CoreError::InvalidInheritance {
            entity: def.name.clone(),
            reason: "a proxy cannot declare fields".into(),
        });
    }
    Ok(Entity {
        name: def.name.clone(),
        app_label: def.app_label.clone(),
        concrete: parent.concrete.clone(),
        fields: parent.fields.clone(),
        pk: parent.pk.clone(),
        pk_kind: parent.pk_kind,
        inheritance: def.inheritance.clone(),
        history: def.history.or(parent.history),
        additional_data: def.additional_data.or(parent.additional_data),
        repr: def.repr.or(parent.repr),
        auto_created: false,
    })
}

fn resolve_multi_table(def: &EntityDef, parent: &Entity) -> Result<Entity, CoreError> {
    if parent.is_proxy() {
        return Err(CoreError::InvalidInheritance {
            entity: def.name.clone(),
            reason: format!("cannot inherit storage from proxy {}", parent.name),
        });
    }
    if def.fields.iter().any(|f| f.primary_key) {
        return Err(CoreError::InvalidInheritance {
            entity: def.name.clone(),
            reason: "a multi-table child cannot declare its own primary key".into(),
        });
    }

    let mut fields: Vec<FieldDef> = parent
        .fields
        .iter()
        .cloned()
        .map(|mut f| {
            f.primary_key = false;
            f
        })
        .collect();
    let ptr_name = format!("{}_ptr", parent.name.to_lowercase());
    fields.push(FieldDef::new(
        ptr_name.clone(),
        FieldKind::OneToOne {
            to: parent.name.clone(),
            on_delete: OnDelete::Cascade,
            parent_link: true,
        },
    )
    .primary_key());
    fields.extend(def.fields.iter().cloned());

    Ok(Entity {
        name: def.name.clone(),
        app_label: def.app_label.clone(),
        concrete: def.name.clone(),
        fields,
        pk: ptr_name,
        pk_kind: parent.pk_kind,
        inheritance: def.inheritance.clone(),
        history: def.history.or(parent.history),
        additional_data: def.additional_data.or(parent.additional_data),
        repr: def.repr.or(parent.repr),
        auto_created: false,
    })
}

fn pk_kind_of(entity: &str, kind: &FieldKind) -> Result<PkKind, CoreError> {
    match kind {
        FieldKind::AutoInteger | FieldKind::Integer => Ok(PkKind::Int),
        FieldKind::Char { .. } | FieldKind::Text => Ok(PkKind::Str),
        FieldKind::Uuid { .. } => Ok(PkKind::Uuid),
        other => Err(CoreError::Validation(format!(
            "{entity} cannot be keyed by a {} field",
            other.type_name()
        ))),
    }
}

fn through_entity(owner: &Entity, field: &FieldDef) -> (ThroughInfo, Entity) {
    let (target, symmetrical) = match &field.kind {
        FieldKind::ManyToMany { to, symmetrical } => (to.clone(), *symmetrical),
        _ => (owner.name.clone(), false),
    };
    let owner_lower = owner.name.to_lowercase();
    let (source_field, target_field) = if target == owner.name {
        (format!("from_{owner_lower}"), format!("to_{owner_lower}"))
    } else {
        (owner_lower, target.to_lowercase())
    };
    let name = format!("{}_{}", owner.name, field.name);

    let entity = Entity {
        name: name.clone(),
        app_label: owner.app_label.clone(),
        concrete: name.clone(),
        fields: vec![
            FieldDef::auto("id"),
            FieldDef::foreign_key(source_field.clone(), owner.name.clone(), OnDelete::Cascade),
            FieldDef::foreign_key(target_field.clone(), target.clone(), OnDelete::Cascade),
        ],
        pk: "id".into(),
        pk_kind: PkKind::Int,
        inheritance: Inheritance::Concrete,
        history: None,
        additional_data: None,
        repr: None,
        auto_created: true,
    };
    let info = ThroughInfo {
        entity: name,
        source_field,
        target_field,
        target,
        symmetrical,
    };
    (info, entity)
}
