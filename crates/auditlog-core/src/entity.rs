//! Entity declarations and their resolved form.
//!
//! An `EntityDef` is what a user writes. A `Schema` resolves each definition
//! into an `Entity`, which has the full field list (inherited fields
//! included), a single primary key and the storage entity that backs it.

use serde_json::{Map, Value};

use crate::errors::CoreError;
use crate::field::{FieldDef, FieldKind};
use crate::instance::{Instance, RelatedContext};
use crate::value::{FieldValue, PkValue};

/// Extension point returning extra key/value data attached to every new
/// log entry for the instance.
pub type AdditionalDataFn = fn(&Instance, &RelatedContext) -> Option<Map<String, Value>>;

/// Custom human-readable representation of an instance.
pub type ReprFn = fn(&Instance) -> String;

/// Marks an entity as history-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryField {
    /// Whether integer keys are looked up through the indexed `object_id`.
    pub pk_indexable: bool,
    /// Whether deleting an instance deletes its earlier history.
    pub delete_related: bool,
}

impl Default for HistoryField {
    fn default() -> Self {
        Self {
            pk_indexable: true,
            delete_related: true,
        }
    }
}

impl HistoryField {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn pk_indexable(mut self, pk_indexable: bool) -> Self {
        self.pk_indexable = pk_indexable;
        self
    }

    #[must_use]
    pub const fn delete_related(mut self, delete_related: bool) -> Self {
        self.delete_related = delete_related;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inheritance {
    Concrete,
    /// Same storage and fields as the parent, tracked under its own name.
    Proxy { parent: String },
    /// Own storage holding the parent's fields plus a parent-link key.
    MultiTable { parent: String },
}

/// Type of value an entity is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkKind {
    Int,
    Str,
    Uuid,
}

/// A user-written entity declaration.
#[derive(Debug, Clone)]
pub struct EntityDef {
    pub app_label: String,
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub inheritance: Inheritance,
    pub history: Option<HistoryField>,
    pub additional_data: Option<AdditionalDataFn>,
    pub repr: Option<ReprFn>,
    pub auto_created: bool,
}

impl EntityDef {
    #[must_use]
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
            fields: Vec::new(),
            inheritance: Inheritance::Concrete,
            history: None,
            additional_data: None,
            repr: None,
            auto_created: false,
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn proxy_of(mut self, parent: impl Into<String>) -> Self {
        self.inheritance = Inheritance::Proxy {
            parent: parent.into(),
        };
        self
    }

    #[must_use]
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inheritance = Inheritance::MultiTable {
            parent: parent.into(),
        };
        self
    }

    #[must_use]
    pub const fn history(mut self, history: HistoryField) -> Self {
        self.history = Some(history);
        self
    }

    #[must_use]
    pub fn additional_data(mut self, hook: AdditionalDataFn) -> Self {
        self.additional_data = Some(hook);
        self
    }

    #[must_use]
    pub fn repr(mut self, repr: ReprFn) -> Self {
        self.repr = Some(repr);
        self
    }
}

/// A resolved entity, produced by [`Schema::build`](crate::schema::Schema::build).
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) name: String,
    pub(crate) app_label: String,
    pub(crate) concrete: String,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) pk: String,
    pub(crate) pk_kind: PkKind,
    pub(crate) inheritance: Inheritance,
    pub(crate) history: Option<HistoryField>,
    pub(crate) additional_data: Option<AdditionalDataFn>,
    pub(crate) repr: Option<ReprFn>,
    pub(crate) auto_created: bool,
}

impl Entity {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn app_label(&self) -> &str {
        &self.app_label
    }

    /// Name of the entity whose storage holds this entity's rows. Differs
    /// from `name` only for proxies.
    #[must_use]
    pub fn concrete_name(&self) -> &str {
        &self.concrete
    }

    #[must_use]
    pub const fn inheritance(&self) -> &Inheritance {
        &self.inheritance
    }

    #[must_use]
    pub const fn is_proxy(&self) -> bool {
        matches!(self.inheritance, Inheritance::Proxy { .. })
    }

    /// Through entities created for many-to-many fields.
    #[must_use]
    pub const fn is_auto_created(&self) -> bool {
        self.auto_created
    }

    /// `"<app_label>.<concrete name lowercased>"`, shared by a proxy and its parent.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("{}.{}", self.app_label, self.concrete.to_lowercase())
    }

    /// All fields, inherited ones first.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that hold a value in the instance snapshot.
    pub fn concrete_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_concrete())
    }

    pub fn many_to_many_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_many_to_many())
    }

    #[must_use]
    pub fn pk_name(&self) -> &str {
        &self.pk
    }

    #[must_use]
    pub fn pk_field(&self) -> Option<&FieldDef> {
        self.field(&self.pk)
    }

    #[must_use]
    pub const fn pk_kind(&self) -> PkKind {
        self.pk_kind
    }

    #[must_use]
    pub const fn history(&self) -> Option<HistoryField> {
        self.history
    }

    #[must_use]
    pub const fn additional_data_hook(&self) -> Option<AdditionalDataFn> {
        self.additional_data
    }

    #[must_use]
    pub fn pk_of(&self, instance: &Instance) -> Option<PkValue> {
        instance.pk_in(&self.pk)
    }

    /// Human-readable representation, `"<Name> object (<pk>)"` by default.
    #[must_use]
    pub fn repr_of(&self, instance: &Instance) -> String {
        if let Some(repr) = self.repr {
            return repr(instance);
        }
        let pk = self
            .pk_of(instance)
            .map_or_else(|| "None".to_string(), |pk| pk.to_string());
        format!("{} object ({pk})", instance.entity())
    }

    /// Parse a stored key back into a typed value.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if `raw` is not a valid key of this entity.
    pub fn parse_pk(&self, raw: &str) -> Result<PkValue, CoreError> {
        match self.pk_kind {
            PkKind::Int => raw.parse::<i64>().map(PkValue::Int).map_err(|e| {
                CoreError::Validation(format!("invalid integer key '{raw}' for {}: {e}", self.name))
            }),
            PkKind::Str => Ok(PkValue::Str(raw.to_string())),
            PkKind::Uuid => uuid::Uuid::parse_str(raw).map(PkValue::Uuid).map_err(|e| {
                CoreError::Validation(format!("invalid uuid key '{raw}' for {}: {e}", self.name))
            }),
        }
    }

    /// The field value that stores `pk` in this entity's key column.
    #[must_use]
    pub fn pk_value(&self, pk: &PkValue) -> FieldValue {
        match self.pk_field().map(|f| &f.kind) {
            Some(FieldKind::OneToOne { .. }) => FieldValue::Ref(pk.clone()),
            _ => match pk {
                PkValue::Int(n) => FieldValue::Int(*n),
                PkValue::Str(s) => FieldValue::Text(s.clone()),
                PkValue::Uuid(u) => FieldValue::Uuid(*u),
            },
        }
    }

    /// Fill unset fields with their declared default, `Null` for nullable
    /// fields, or an empty string for text fields. Auto-valued fields are
    /// left for the storage layer.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingValue` for a required field with no default.
    pub fn complete_defaults(&self, instance: &mut Instance) -> Result<(), CoreError> {
        for field in self.concrete_fields() {
            if instance.contains(&field.name) || field.is_auto() || field.name == self.pk {
                continue;
            }
            let value = match (&field.default, &field.kind) {
                (Some(default), _) => default.clone(),
                (None, _) if field.null => FieldValue::Null,
                (None, FieldKind::Char { .. } | FieldKind::Text) => FieldValue::Text(String::new()),
                _ => {
                    return Err(CoreError::MissingValue {
                        entity: self.name.clone(),
                        field: field.name.clone(),
                    });
                }
            };
            instance.set(field.name.clone(), value);
        }
        Ok(())
    }

    /// Check every value of `instance` against its field declaration.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` for unknown fields, values of the wrong type,
    /// nulls in non-nullable fields, or length/size limits exceeded.
    pub fn validate(&self, instance: &Instance) -> Result<(), CoreError> {
        for (name, value) in instance.values() {
            let field = self
                .field(name)
                .filter(|f| f.is_concrete())
                .ok_or_else(|| CoreError::UnknownField {
                    entity: self.name.clone(),
                    field: name.clone(),
                })?;

            if !value.fits(&field.kind) {
                return Err(CoreError::TypeMismatch {
                    entity: self.name.clone(),
                    field: name.clone(),
                    expected: field.kind.type_name().to_string(),
                });
            }
            if value.is_null() && !field.null {
                return Err(CoreError::MissingValue {
                    entity: self.name.clone(),
                    field: name.clone(),
                });
            }
            self.check_limits(field, value)?;
        }
        Ok(())
    }

    fn check_limits(&self, field: &FieldDef, value: &FieldValue) -> Result<(), CoreError> {
        match (&field.kind, value) {
            (FieldKind::Char { max_length }, FieldValue::Text(s)) if s.chars().count() > *max_length => {
                Err(CoreError::Validation(format!(
                    "{}.{} exceeds max length {max_length}",
                    self.name, field.name
                )))
            }
            (FieldKind::Array { base, size }, FieldValue::Array(items)) => {
                if let Some(size) = size {
                    if items.len() > *size {
                        return Err(CoreError::Validation(format!(
                            "{}.{} holds more than {size} items",
                            self.name, field.name
                        )));
                    }
                }
                let element = FieldDef::new(field.name.clone(), (**base).clone());
                items
                    .iter()
                    .try_for_each(|item| self.check_limits(&element, item))
            }
            _ => Ok(()),
        }
    }
}
