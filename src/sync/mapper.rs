//! Field transformation between the two sides of a binding.
//!
//! A [`Mapper`] is a declarative table: direct field copies plus a list of
//! [`Rule`]s. Mapping is a pure function of the source record and the
//! [`MapContext`]; the only side effects are binding lookups and, for
//! natural-key matching, a search on the target side.

use serde_json::Value;

use crate::config::BackendConfig;
use crate::rpc::{
    is_falsy, many2one_id, replace_command, x2many_ids, Domain, OdooRpc, Record, SearchOptions,
};
use crate::storage::SqliteStorage;

use super::binder::Binder;
use super::html::clean_html;
use super::types::{Direction, SyncError, SyncResult};

/// Signature of a custom mapping rule.
pub type CustomFn = fn(&MapContext<'_>, &Record) -> SyncResult<Record>;

/// Everything a rule may look at while mapping one record.
pub struct MapContext<'a> {
    pub direction: Direction,
    pub backend: &'a BackendConfig,
    pub storage: &'a SqliteStorage,
    /// The side being written.
    pub target: &'a dyn OdooRpc,
    /// Model name on the target side.
    pub target_model: &'a str,
}

impl<'a> MapContext<'a> {
    #[must_use]
    pub fn binder_for<'b>(&'b self, model: &'b str) -> Binder<'b> {
        Binder::new(self.storage, &self.backend.name, model)
    }

    /// Translate a source-side id of `model` into the target-side id.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding lookup fails.
    pub fn resolve(&self, model: &str, source_id: i64) -> SyncResult<Option<i64>> {
        let binder = self.binder_for(model);
        match self.direction {
            Direction::Import => binder.to_internal(source_id, true),
            Direction::Export => binder.to_external(source_id, true),
        }
    }

    fn unresolved(&self, model: &str, source_id: i64) -> SyncError {
        let (side, verb) = match self.direction {
            Direction::Import => ("remote", "imported"),
            Direction::Export => ("local", "exported"),
        };
        SyncError::Mapping(format!(
            "{model} with {side} id {source_id} is not {verb} yet"
        ))
    }
}

/// What to do when a many2one reference has no binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Abort the mapping with a `Mapping` error.
    Required,
    /// Write `false`.
    Lenient,
    /// Use the backend constant with this key.
    Fallback(&'static str),
}

/// A literal value usable in rule tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    False,
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl Literal {
    #[must_use]
    pub fn to_value(self) -> Value {
        match self {
            Self::False => Value::Bool(false),
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::from(i),
            Self::Str(s) => Value::from(s),
        }
    }
}

/// One component of a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKey {
    /// Compare a plain field.
    Field {
        from: &'static str,
        to: &'static str,
    },
    /// Compare a many2one through the bindings of `model`.
    Many2One {
        from: &'static str,
        to: &'static str,
        model: &'static str,
    },
}

/// The transformation a rule applies.
#[derive(Debug, Clone)]
pub enum RuleKind {
    Many2One {
        from: &'static str,
        to: &'static str,
        model: &'static str,
        missing: Missing,
    },
    Many2Many {
        from: &'static str,
        to: &'static str,
        model: &'static str,
        lenient: bool,
    },
    /// Backend constant by key.
    Constant {
        to: &'static str,
        key: &'static str,
        default: Option<Literal>,
    },
    Fixed {
        to: &'static str,
        value: Literal,
    },
    /// Copy with `<style>` blocks and `style` attributes removed.
    Html {
        from: &'static str,
        to: &'static str,
    },
    /// Read `legacy` on backends up to `legacy_until`, else `modern`.
    Versioned {
        to: &'static str,
        legacy: &'static str,
        modern: &'static str,
        legacy_until: u32,
    },
    /// Designate an existing unbound target record by natural key.
    MatchExisting {
        keys: Vec<MatchKey>,
        include_inactive: bool,
    },
    Custom {
        name: &'static str,
        func: CustomFn,
    },
}

/// A mapping rule, optionally restricted to record creation.
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: RuleKind,
    pub only_create: bool,
}

impl Rule {
    fn of(kind: RuleKind) -> Self {
        Self {
            kind,
            only_create: false,
        }
    }

    /// Required many2one through the bindings of `model`.
    #[must_use]
    pub fn many2one(from: &'static str, to: &'static str, model: &'static str) -> Self {
        Self::of(RuleKind::Many2One {
            from,
            to,
            model,
            missing: Missing::Required,
        })
    }

    /// Required many2many written as a replace command.
    #[must_use]
    pub fn many2many(from: &'static str, to: &'static str, model: &'static str) -> Self {
        Self::of(RuleKind::Many2Many {
            from,
            to,
            model,
            lenient: false,
        })
    }

    #[must_use]
    pub fn constant(to: &'static str, key: &'static str) -> Self {
        Self::of(RuleKind::Constant {
            to,
            key,
            default: None,
        })
    }

    #[must_use]
    pub fn fixed(to: &'static str, value: Literal) -> Self {
        Self::of(RuleKind::Fixed { to, value })
    }

    #[must_use]
    pub fn html(from: &'static str, to: &'static str) -> Self {
        Self::of(RuleKind::Html { from, to })
    }

    #[must_use]
    pub fn versioned(
        to: &'static str,
        legacy: &'static str,
        modern: &'static str,
        legacy_until: u32,
    ) -> Self {
        Self::of(RuleKind::Versioned {
            to,
            legacy,
            modern,
            legacy_until,
        })
    }

    /// Natural-key match; always only-create.
    #[must_use]
    pub fn match_existing(keys: &[MatchKey]) -> Self {
        Self {
            kind: RuleKind::MatchExisting {
                keys: keys.to_vec(),
                include_inactive: false,
            },
            only_create: true,
        }
    }

    #[must_use]
    pub fn custom(name: &'static str, func: CustomFn) -> Self {
        Self::of(RuleKind::Custom { name, func })
    }

    /// Only apply when the target record is created.
    #[must_use]
    pub fn on_create(mut self) -> Self {
        self.only_create = true;
        self
    }

    /// Drop unresolved references instead of failing.
    #[must_use]
    pub fn lenient(mut self) -> Self {
        match &mut self.kind {
            RuleKind::Many2One { missing, .. } => *missing = Missing::Lenient,
            RuleKind::Many2Many { lenient, .. } => *lenient = true,
            _ => {}
        }
        self
    }

    /// Fall back to a backend constant when the reference is unresolved.
    #[must_use]
    pub fn with_fallback(mut self, key: &'static str) -> Self {
        if let RuleKind::Many2One { missing, .. } = &mut self.kind {
            *missing = Missing::Fallback(key);
        }
        self
    }

    /// Default for a constant missing from the backend configuration.
    #[must_use]
    pub fn or(mut self, value: Literal) -> Self {
        if let RuleKind::Constant { default, .. } = &mut self.kind {
            *default = Some(value);
        }
        self
    }

    /// Let natural-key matching see archived records.
    #[must_use]
    pub fn include_inactive(mut self) -> Self {
        if let RuleKind::MatchExisting {
            include_inactive, ..
        } = &mut self.kind
        {
            *include_inactive = true;
        }
        self
    }

    /// Target fields this rule may write.
    #[must_use]
    pub fn targets(&self) -> Vec<&'static str> {
        match &self.kind {
            RuleKind::Many2One { to, .. }
            | RuleKind::Many2Many { to, .. }
            | RuleKind::Constant { to, .. }
            | RuleKind::Fixed { to, .. }
            | RuleKind::Html { to, .. }
            | RuleKind::Versioned { to, .. } => vec![*to],
            RuleKind::MatchExisting { .. } | RuleKind::Custom { .. } => Vec::new(),
        }
    }

    fn apply(&self, ctx: &MapContext<'_>, record: &Record, out: &mut MappedRecord) -> SyncResult<()> {
        let values = if self.only_create {
            &mut out.create_only
        } else {
            &mut out.values
        };

        match &self.kind {
            RuleKind::Many2One {
                from,
                to,
                model,
                missing,
            } => {
                let value = map_many2one(ctx, record.get(*from), *model, *missing)?;
                values.insert((*to).to_string(), value);
            }

            RuleKind::Many2Many {
                from,
                to,
                model,
                lenient,
            } => {
                let mut ids = Vec::new();
                for source_id in record.get(*from).map(x2many_ids).unwrap_or_default() {
                    match ctx.resolve(*model, source_id)? {
                        Some(id) => ids.push(id),
                        None if *lenient => {}
                        None => return Err(ctx.unresolved(model, source_id)),
                    }
                }
                values.insert((*to).to_string(), replace_command(&ids));
            }

            RuleKind::Constant { to, key, default } => {
                let value = match (ctx.backend.constant(key), default) {
                    (Some(value), _) => value.clone(),
                    (None, Some(default)) => default.to_value(),
                    (None, None) => {
                        return Err(SyncError::Config(format!(
                            "backend '{}' has no constant '{key}'",
                            ctx.backend.name
                        )));
                    }
                };
                values.insert((*to).to_string(), value);
            }

            RuleKind::Fixed { to, value } => {
                values.insert((*to).to_string(), value.to_value());
            }

            RuleKind::Html { from, to } => {
                let value = match record.get(*from) {
                    Some(Value::String(html)) if !html.is_empty() => Value::String(clean_html(html)),
                    _ => Value::Bool(false),
                };
                values.insert((*to).to_string(), value);
            }

            RuleKind::Versioned {
                to,
                legacy,
                modern,
                legacy_until,
            } => {
                let source = if ctx.backend.version_at_most(*legacy_until) {
                    legacy
                } else {
                    modern
                };
                if let Some(value) = record.get(*source) {
                    values.insert((*to).to_string(), value.clone());
                }
            }

            RuleKind::MatchExisting {
                keys,
                include_inactive,
            } => {
                out.matched = match_existing(ctx, record, keys, *include_inactive)?;
            }

            RuleKind::Custom { name, func } => {
                let produced = func(ctx, record).map_err(|e| match e {
                    SyncError::Mapping(msg) => SyncError::Mapping(format!("{name}: {msg}")),
                    other => other,
                })?;
                values.extend(produced);
            }
        }
        Ok(())
    }
}

fn map_many2one(
    ctx: &MapContext<'_>,
    source: Option<&Value>,
    model: &'static str,
    missing: Missing,
) -> SyncResult<Value> {
    let Some(source_id) = source.and_then(many2one_id) else {
        return Ok(Value::Bool(false));
    };

    if let Some(id) = ctx.resolve(model, source_id)? {
        return Ok(Value::from(id));
    }

    match missing {
        Missing::Required => Err(ctx.unresolved(model, source_id)),
        Missing::Lenient => Ok(Value::Bool(false)),
        Missing::Fallback(key) => ctx.backend.constant(key).cloned().ok_or_else(|| {
            SyncError::Mapping(format!(
                "{model} with id {source_id} is not bound and backend '{}' has no '{key}' fallback",
                ctx.backend.name
            ))
        }),
    }
}

fn match_existing(
    ctx: &MapContext<'_>,
    record: &Record,
    keys: &[MatchKey],
    include_inactive: bool,
) -> SyncResult<Option<i64>> {
    let mut domain = Domain::new();
    for key in keys {
        match key {
            MatchKey::Field { from, to } => {
                let Some(value) = record.get(*from).filter(|v| !is_falsy(v)) else {
                    return Ok(None);
                };
                domain.push(to, "=", value.clone());
            }
            MatchKey::Many2One { from, to, model } => {
                let Some(source_id) = record.get(*from).and_then(many2one_id) else {
                    return Ok(None);
                };
                let Some(id) = ctx.resolve(*model, source_id)? else {
                    return Ok(None);
                };
                domain.push(to, "=", id);
            }
        }
    }

    let options = SearchOptions::limit(2).with_inactive(include_inactive);
    let found = ctx.target.search(ctx.target_model, &domain, &options)?;
    if found.len() == 1 {
        tracing::debug!(model = ctx.target_model, id = found[0], "matched existing record by natural key");
        Ok(Some(found[0]))
    } else {
        Ok(None)
    }
}

/// Declarative mapping table for one model and direction.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    pub direct: Vec<(&'static str, &'static str)>,
    pub rules: Vec<Rule>,
}

impl Mapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add direct `(source, target)` field copies.
    #[must_use]
    pub fn direct(mut self, pairs: &[(&'static str, &'static str)]) -> Self {
        self.direct.extend_from_slice(pairs);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Map one source record.
    ///
    /// Direct copies skip fields absent from the source. Rules run in
    /// declaration order and later rules overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Returns `Mapping` when a required reference is unbound, `Config`
    /// when a constant is missing, or an RPC error from natural-key search.
    pub fn map(&self, ctx: &MapContext<'_>, record: &Record) -> SyncResult<MappedRecord> {
        let mut out = MappedRecord::default();
        for (from, to) in &self.direct {
            if let Some(value) = record.get(*from) {
                out.values.insert((*to).to_string(), value.clone());
            }
        }
        for rule in &self.rules {
            rule.apply(ctx, record, &mut out)?;
        }
        Ok(out)
    }
}

/// Values produced by a [`Mapper`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRecord {
    values: Record,
    create_only: Record,
    matched: Option<i64>,
}

impl MappedRecord {
    /// Values to write. Creation includes the only-create values.
    #[must_use]
    pub fn values(&self, for_create: bool) -> Record {
        let mut values = self.values.clone();
        if for_create {
            values.extend(self.create_only.clone());
        }
        values
    }

    /// Update values that differ from the `current` target record.
    ///
    /// Relational values are compared by id, so `[7, "Chairs"]` equals `7`
    /// and `[[6, 0, [2, 1]]]` equals `[1, 2]`.
    #[must_use]
    pub fn update_values(&self, current: Option<&Record>) -> Record {
        let Some(current) = current else {
            return self.values.clone();
        };
        self.values
            .iter()
            .filter(|(field, value)| {
                current
                    .get(field.as_str())
                    .is_none_or(|existing| !same_value(value, existing))
            })
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    /// Existing target record designated by natural-key matching.
    #[must_use]
    pub fn matched(&self) -> Option<i64> {
        self.matched
    }
}

fn is_many2one_pair(value: &Value) -> bool {
    matches!(value, Value::Array(pair) if pair.len() == 2 && pair[0].is_i64() && pair[1].is_string())
}

fn is_command_list(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.first().is_some_and(Value::is_array))
}

fn same_value(mapped: &Value, existing: &Value) -> bool {
    if is_falsy(mapped) && is_falsy(existing) {
        return true;
    }
    if is_command_list(mapped) || (mapped.is_array() && existing.is_array() && !is_many2one_pair(existing)) {
        let mut left = x2many_ids(mapped);
        let mut right = x2many_ids(existing);
        left.sort_unstable();
        right.sort_unstable();
        return left == right;
    }
    if is_many2one_pair(existing) {
        return many2one_id(existing) == many2one_id(mapped);
    }
    match (mapped, existing) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}
