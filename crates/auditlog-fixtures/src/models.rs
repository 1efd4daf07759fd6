//! Fixture entity declarations.
//!
//! Each entity isolates one tracking behaviour: key types, proxies,
//! multi-table inheritance, relations, field options, display formatting
//! and additional data.

use auditlog_core::entity::{EntityDef, HistoryField};
use auditlog_core::enums::OnDelete;
use auditlog_core::field::{FieldDef, FieldKind};
use auditlog_core::instance::{Instance, RelatedContext};
use auditlog_core::value::{FieldValue, PkValue};
use serde_json::{Map, Value, json};

pub const APP_LABEL: &str = "auditlog_tests";

pub const RED: &str = "r";
pub const YELLOW: &str = "y";
pub const GREEN: &str = "g";

pub const STATUS_CHOICES: &[(&str, &str)] = &[(RED, "Red"), (YELLOW, "Yellow"), (GREEN, "Green")];

pub const SIMPLE_MODEL: &str = "SimpleModel";
pub const ALT_PRIMARY_KEY_MODEL: &str = "AltPrimaryKeyModel";
pub const UUID_PRIMARY_KEY_MODEL: &str = "UUIDPrimaryKeyModel";
pub const PROXY_MODEL: &str = "ProxyModel";
pub const RELATED_MODEL_PARENT: &str = "RelatedModelParent";
pub const RELATED_MODEL: &str = "RelatedModel";
pub const MANY_RELATED_MODEL: &str = "ManyRelatedModel";
pub const MANY_RELATED_OTHER_MODEL: &str = "ManyRelatedOtherModel";
/// Auto-created through entity of `ManyRelatedModel.recursive`.
pub const MANY_RELATED_RECURSIVE_THROUGH: &str = "ManyRelatedModel_recursive";
/// Auto-created through entity of `ManyRelatedModel.related`.
pub const MANY_RELATED_RELATED_THROUGH: &str = "ManyRelatedModel_related";
pub const SIMPLE_INCLUDE_MODEL: &str = "SimpleIncludeModel";
pub const SIMPLE_EXCLUDE_MODEL: &str = "SimpleExcludeModel";
pub const SIMPLE_MAPPING_MODEL: &str = "SimpleMappingModel";
pub const SIMPLE_MASKED_MODEL: &str = "SimpleMaskedModel";
pub const ADDITIONAL_DATA_INCLUDED_MODEL: &str = "AdditionalDataIncludedModel";
pub const DATE_TIME_FIELD_MODEL: &str = "DateTimeFieldModel";
pub const CHOICES_FIELD_MODEL: &str = "ChoicesFieldModel";
pub const CHARFIELD_TEXTFIELD_MODEL: &str = "CharfieldTextfieldModel";
pub const POSTGRES_ARRAY_FIELD_MODEL: &str = "PostgresArrayFieldModel";
pub const NO_DELETE_HISTORY_MODEL: &str = "NoDeleteHistoryModel";
pub const JSON_MODEL: &str = "JSONModel";
pub const ONE_TO_ONE_FIELD_MODEL: &str = "OneToOneFieldModel";

fn entity(name: &str) -> EntityDef {
    EntityDef::new(APP_LABEL, name)
}

/// `text`, `boolean`, `integer` and `datetime`, shared by the three
/// key-type variants.
fn simple_fields(def: EntityDef) -> EntityDef {
    def.field(FieldDef::text("text").blank())
        .field(FieldDef::boolean("boolean").default(false))
        .field(FieldDef::integer("integer").null().blank())
        .field(FieldDef::datetime("datetime").auto_now())
}

fn pk_json(pk: &PkValue) -> Value {
    match pk {
        PkValue::Int(n) => Value::from(*n),
        other => Value::String(other.to_string()),
    }
}

/// `{"related_model_id": <lowest related key or null>}`.
fn many_related_additional_data(
    _instance: &Instance,
    related: &RelatedContext,
) -> Option<Map<String, Value>> {
    let mut data = Map::new();
    data.insert(
        "related_model_id".into(),
        related.first("related").map_or(Value::Null, pk_json),
    );
    Some(data)
}

/// Key and text of the referenced `SimpleModel`.
fn related_simple_additional_data(
    instance: &Instance,
    related: &RelatedContext,
) -> Option<Map<String, Value>> {
    let mut data = Map::new();
    let id = match instance.value("related") {
        FieldValue::Ref(pk) => pk_json(pk),
        _ => Value::Null,
    };
    data.insert("related_model_id".into(), id);
    data.insert(
        "related_model_text".into(),
        related
            .related("related")
            .and_then(|simple| simple.text("text"))
            .map_or(Value::Null, |text| Value::String(text.to_string())),
    );
    Some(data)
}

/// Every fixture entity, in declaration order.
#[must_use]
pub fn definitions() -> Vec<EntityDef> {
    vec![
        simple_fields(entity(SIMPLE_MODEL)).history(HistoryField::new()),
        simple_fields(
            entity(ALT_PRIMARY_KEY_MODEL).field(FieldDef::char("key", 100).primary_key()),
        )
        .history(HistoryField::new().pk_indexable(false)),
        simple_fields(
            entity(UUID_PRIMARY_KEY_MODEL)
                .field(FieldDef::uuid("id").primary_key().auto_generate()),
        )
        .history(HistoryField::new().pk_indexable(false)),
        entity(PROXY_MODEL).proxy_of(SIMPLE_MODEL),
        entity(RELATED_MODEL_PARENT),
        entity(RELATED_MODEL)
            .inherits(RELATED_MODEL_PARENT)
            .field(
                FieldDef::foreign_key("related", SIMPLE_MODEL, OnDelete::Cascade)
                    .related_name("related_models"),
            )
            .field(
                FieldDef::one_to_one("one_to_one", SIMPLE_MODEL, OnDelete::Cascade)
                    .related_name("reverse_one_to_one"),
            )
            .history(HistoryField::new()),
        entity(MANY_RELATED_MODEL)
            .field(FieldDef::many_to_many("recursive", "self"))
            .field(
                FieldDef::many_to_many("related", MANY_RELATED_OTHER_MODEL)
                    .related_name("related"),
            )
            .history(HistoryField::new())
            .additional_data(many_related_additional_data),
        entity(MANY_RELATED_OTHER_MODEL).history(HistoryField::new()),
        entity(SIMPLE_INCLUDE_MODEL)
            .field(FieldDef::char("label", 100))
            .field(FieldDef::text("text").blank())
            .history(HistoryField::new()),
        entity(SIMPLE_EXCLUDE_MODEL)
            .field(FieldDef::char("label", 100))
            .field(FieldDef::text("text").blank())
            .history(HistoryField::new()),
        entity(SIMPLE_MAPPING_MODEL)
            .field(FieldDef::char("sku", 100))
            .field(FieldDef::char("vtxt", 100).verbose_name("Version"))
            .field(FieldDef::char("not_mapped", 100))
            .history(HistoryField::new()),
        entity(SIMPLE_MASKED_MODEL)
            .field(FieldDef::char("address", 100))
            .field(FieldDef::text("text"))
            .history(HistoryField::new()),
        entity(ADDITIONAL_DATA_INCLUDED_MODEL)
            .field(FieldDef::char("label", 100))
            .field(FieldDef::text("text").blank())
            .field(FieldDef::foreign_key("related", SIMPLE_MODEL, OnDelete::Cascade))
            .history(HistoryField::new())
            .additional_data(related_simple_additional_data),
        entity(DATE_TIME_FIELD_MODEL)
            .field(FieldDef::char("label", 100))
            .field(FieldDef::datetime("timestamp"))
            .field(FieldDef::date("date"))
            .field(FieldDef::time("time"))
            .field(FieldDef::datetime("naive_dt").null().blank())
            .history(HistoryField::new()),
        entity(CHOICES_FIELD_MODEL)
            .field(FieldDef::char("status", 1).choices(STATUS_CHOICES))
            .field(FieldDef::char("multiplechoice", 255).choices(STATUS_CHOICES))
            .history(HistoryField::new()),
        entity(CHARFIELD_TEXTFIELD_MODEL)
            .field(FieldDef::char("longchar", 255))
            .field(FieldDef::text("longtextfield"))
            .history(HistoryField::new()),
        entity(POSTGRES_ARRAY_FIELD_MODEL)
            .field(
                FieldDef::array("arrayfield", FieldKind::Char { max_length: 1 }, Some(3))
                    .choices(STATUS_CHOICES),
            )
            .history(HistoryField::new()),
        entity(NO_DELETE_HISTORY_MODEL)
            .field(FieldDef::integer("integer").null().blank())
            .history(HistoryField::new().delete_related(false)),
        entity(JSON_MODEL)
            .field(FieldDef::json("json").default(json!({})))
            .history(HistoryField::new().delete_related(false)),
        entity(ONE_TO_ONE_FIELD_MODEL)
            .field(FieldDef::one_to_one("related", "self", OnDelete::SetNull).null())
            .history(HistoryField::new()),
    ]
}
