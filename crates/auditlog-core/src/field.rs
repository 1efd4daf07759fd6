//! Field declarations.
//!
//! A `FieldDef` is built with a named constructor per kind and refined with
//! chained modifiers:
//!
//! ```
//! use auditlog_core::field::FieldDef;
//!
//! let status = FieldDef::char("status", 1).choices(&[("r", "Red"), ("g", "Green")]);
//! let integer = FieldDef::integer("integer").null().blank();
//! assert!(status.has_choices());
//! assert!(integer.null);
//! ```

use crate::enums::OnDelete;
use crate::value::FieldValue;

/// Storage type of a field, including relations.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    AutoInteger,
    Integer,
    Boolean,
    Char {
        max_length: usize,
    },
    Text,
    DateTime {
        auto_now: bool,
    },
    Date,
    Time,
    Uuid {
        auto_generate: bool,
    },
    Json,
    Array {
        base: Box<FieldKind>,
        size: Option<usize>,
    },
    ForeignKey {
        to: String,
        on_delete: OnDelete,
    },
    OneToOne {
        to: String,
        on_delete: OnDelete,
        parent_link: bool,
    },
    ManyToMany {
        to: String,
        symmetrical: bool,
    },
}

impl FieldKind {
    /// Short name used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::AutoInteger => "auto integer",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Char { .. } => "char",
            Self::Text => "text",
            Self::DateTime { .. } => "datetime",
            Self::Date => "date",
            Self::Time => "time",
            Self::Uuid { .. } => "uuid",
            Self::Json => "json",
            Self::Array { .. } => "array",
            Self::ForeignKey { .. } => "foreign key",
            Self::OneToOne { .. } => "one-to-one",
            Self::ManyToMany { .. } => "many-to-many",
        }
    }
}

/// One declared field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub verbose_name: Option<String>,
    pub null: bool,
    pub blank: bool,
    pub primary_key: bool,
    /// Ordered `(value, label)` pairs. For array fields these constrain the
    /// elements.
    pub choices: Vec<(String, String)>,
    pub default: Option<FieldValue>,
    pub related_name: Option<String>,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            verbose_name: None,
            null: false,
            blank: false,
            primary_key: false,
            choices: Vec::new(),
            default: None,
            related_name: None,
        }
    }

    #[must_use]
    pub fn auto(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::AutoInteger).primary_key()
    }

    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    #[must_use]
    pub fn char(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(name, FieldKind::Char { max_length })
    }

    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    #[must_use]
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime { auto_now: false })
    }

    #[must_use]
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    #[must_use]
    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Time)
    }

    #[must_use]
    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Uuid {
                auto_generate: false,
            },
        )
    }

    #[must_use]
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Json)
    }

    #[must_use]
    pub fn array(name: impl Into<String>, base: FieldKind, size: Option<usize>) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                base: Box::new(base),
                size,
            },
        )
    }

    #[must_use]
    pub fn foreign_key(name: impl Into<String>, to: impl Into<String>, on_delete: OnDelete) -> Self {
        Self::new(
            name,
            FieldKind::ForeignKey {
                to: to.into(),
                on_delete,
            },
        )
    }

    #[must_use]
    pub fn one_to_one(name: impl Into<String>, to: impl Into<String>, on_delete: OnDelete) -> Self {
        Self::new(
            name,
            FieldKind::OneToOne {
                to: to.into(),
                on_delete,
                parent_link: false,
            },
        )
    }

    /// Many-to-many field. `to` may be `"self"`; the schema marks
    /// self-relations symmetrical when it resolves them.
    #[must_use]
    pub fn many_to_many(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::ManyToMany {
                to: to.into(),
                symmetrical: false,
            },
        )
    }

    // -- modifiers ----------------------------------------------------------

    #[must_use]
    pub const fn null(mut self) -> Self {
        self.null = true;
        self
    }

    #[must_use]
    pub const fn blank(mut self) -> Self {
        self.blank = true;
        self
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn verbose_name(mut self, label: impl Into<String>) -> Self {
        self.verbose_name = Some(label.into());
        self
    }

    #[must_use]
    pub fn related_name(mut self, name: impl Into<String>) -> Self {
        self.related_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn choices(mut self, choices: &[(&str, &str)]) -> Self {
        self.choices = choices
            .iter()
            .map(|(value, label)| ((*value).to_string(), (*label).to_string()))
            .collect();
        self
    }

    /// Set `auto_now` on a datetime field. No effect on other kinds.
    #[must_use]
    pub fn auto_now(mut self) -> Self {
        if let FieldKind::DateTime { auto_now } = &mut self.kind {
            *auto_now = true;
        }
        self
    }

    /// Generate a random v4 UUID on first save. No effect on other kinds.
    #[must_use]
    pub fn auto_generate(mut self) -> Self {
        if let FieldKind::Uuid { auto_generate } = &mut self.kind {
            *auto_generate = true;
        }
        self
    }

    // -- queries ------------------------------------------------------------

    /// Label shown to humans: `verbose_name`, else the name with underscores
    /// turned into spaces.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.verbose_name
            .clone()
            .unwrap_or_else(|| self.name.replace('_', " "))
    }

    #[must_use]
    pub const fn is_many_to_many(&self) -> bool {
        matches!(self.kind, FieldKind::ManyToMany { .. })
    }

    /// Concrete fields hold a value in the instance snapshot.
    #[must_use]
    pub const fn is_concrete(&self) -> bool {
        !self.is_many_to_many()
    }

    #[must_use]
    pub const fn is_parent_link(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::OneToOne {
                parent_link: true,
                ..
            }
        )
    }

    /// Target entity name of a relation field.
    #[must_use]
    pub fn related_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ForeignKey { to, .. }
            | FieldKind::OneToOne { to, .. }
            | FieldKind::ManyToMany { to, .. } => Some(to),
            _ => None,
        }
    }

    /// Deletion behaviour of a foreign-key or one-to-one field.
    #[must_use]
    pub const fn on_delete(&self) -> Option<OnDelete> {
        match &self.kind {
            FieldKind::ForeignKey { on_delete, .. } | FieldKind::OneToOne { on_delete, .. } => {
                Some(*on_delete)
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn has_choices(&self) -> bool {
        !self.choices.is_empty()
    }

    #[must_use]
    pub fn choice_label(&self, value: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, label)| label.as_str())
    }

    /// Whether the field can be left unset on a new instance.
    #[must_use]
    pub const fn is_auto(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::AutoInteger
                | FieldKind::DateTime { auto_now: true }
                | FieldKind::Uuid {
                    auto_generate: true
                }
        )
    }
}
