//! Filter predicates over resources.
//!
//! A [`Filter`] names a field, an operator and an expected value. Fields are
//! resolved against a [`Resource`] in a fixed order:
//!
//! 1. fixed fields: `id`, `name`, `type`, `provider`, `region`, `zone`
//! 2. exact `metadata[field]`
//! 3. exact `tags[field]`
//! 4. dotted `tags.<key>`
//! 5. dotted `metadata.<key>`
//!
//! An empty fixed field counts as absent. Operators are a closed enum, so a
//! misspelt operator is rejected when the filter is parsed rather than
//! silently matching everything.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::resource::{MetadataValue, Resource};

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Contains,
    In,
    Exists,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
            FilterOperator::Exists => "exists",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eq" | "==" | "=" => Ok(FilterOperator::Eq),
            "ne" | "!=" => Ok(FilterOperator::Ne),
            "contains" | "~" => Ok(FilterOperator::Contains),
            "in" => Ok(FilterOperator::In),
            "exists" => Ok(FilterOperator::Exists),
            other => Err(CoreError::InvalidFilter {
                expression: other.to_string(),
                reason: "unknown operator".to_string(),
            }),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate over one resource field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: MetadataValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<MetadataValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::new(field, FilterOperator::Ne, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Contains, MetadataValue::String(value.into()))
    }

    pub fn one_of<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        Self::new(field, FilterOperator::In, MetadataValue::StringList(values))
    }

    pub fn exists(field: impl Into<String>, expected: bool) -> Self {
        Self::new(field, FilterOperator::Exists, MetadataValue::Bool(expected))
    }

    /// Parse the command-line shorthand.
    ///
    /// | Expression            | Filter                         |
    /// |-----------------------|--------------------------------|
    /// | `tags.env=prod`       | `eq`                           |
    /// | `region!=us-east-1`   | `ne`                           |
    /// | `name~web`            | `contains`                     |
    /// | `type in aws_vpc,aws_subnet` | `in`                    |
    /// | `tags.owner?`         | `exists` = true                |
    /// | `!tags.owner?`        | `exists` = false               |
    /// | `field:op:value`      | explicit operator name         |
    pub fn parse(expression: &str) -> CoreResult<Self> {
        let expr = expression.trim();
        let invalid = |reason: &str| CoreError::InvalidFilter {
            expression: expr.to_string(),
            reason: reason.to_string(),
        };

        if expr.is_empty() {
            return Err(invalid("empty expression"));
        }

        // The earliest operator token splits field from value, so values
        // may contain other operator characters.
        let Some((at, token)) = first_operator_token(expr) else {
            if let Some(field) = expr.strip_suffix('?') {
                return match field.strip_prefix('!') {
                    Some(field) if !field.is_empty() => Ok(Self::exists(field, false)),
                    None if !field.is_empty() => Ok(Self::exists(field, true)),
                    _ => Err(invalid("missing field")),
                };
            }
            if expr.splitn(3, ':').count() == 3 {
                return Err(invalid("unknown operator"));
            }
            return Err(invalid("unrecognised filter syntax"));
        };

        let field = expr[..at].trim();
        let rest = &expr[at + token.len()..];
        if field.is_empty() {
            return Err(invalid("missing field"));
        }

        match token {
            "!=" => Ok(Self::checked(field, FilterOperator::Ne, rest)),
            "=" => Ok(Self::checked(field, FilterOperator::Eq, rest)),
            "~" => Ok(Self::checked(field, FilterOperator::Contains, rest)),
            " in " => {
                let values: Vec<String> = rest
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if values.is_empty() {
                    return Err(invalid("expected 'field in a,b,c'"));
                }
                Ok(Self::one_of(field, values))
            }
            _ => {
                let (op, value) = rest.split_once(':').ok_or_else(|| invalid("expected 'field:op:value'"))?;
                let operator: FilterOperator = op.parse().map_err(|_| invalid("unknown operator"))?;
                let value = match operator {
                    FilterOperator::In => MetadataValue::StringList(
                        value.split(',').map(|v| v.trim().to_string()).collect(),
                    ),
                    FilterOperator::Exists => MetadataValue::Bool(value != "false"),
                    _ => MetadataValue::String(value.to_string()),
                };
                Ok(Self::new(field, operator, value))
            }
        }
    }

    fn checked(field: &str, operator: FilterOperator, value: &str) -> Self {
        Self::new(field, operator, MetadataValue::String(value.trim().to_string()))
    }
}

/// Position and text of the operator token that starts first. A `:` only
/// counts when it opens a `:op:` segment naming a known operator, so tag
/// keys such as `aws:cloudformation:stack-name` stay part of the field.
fn first_operator_token(expr: &str) -> Option<(usize, &'static str)> {
    let mut best: Option<(usize, &'static str)> = None;
    for token in ["!=", "=", "~", " in "] {
        if let Some(at) = expr.find(token) {
            if best.map_or(true, |(b, _)| at < b) {
                best = Some((at, token));
            }
        }
    }

    for (at, _) in expr.match_indices(':') {
        if best.is_some_and(|(b, _)| b < at) {
            break;
        }
        let names_operator = expr[at + 1..]
            .split_once(':')
            .is_some_and(|(op, _)| op.parse::<FilterOperator>().is_ok());
        if names_operator {
            return Some((at, ":"));
        }
    }
    best
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = serde_json::to_string(&self.value).unwrap_or_default();
        write!(f, "{} {} {}", self.field, self.operator, value)
    }
}

/// Evaluates [`Filter`]s against resources.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// True when every filter matches. An empty list passes everything.
    pub fn matches_all(resource: &Resource, filters: &[Filter]) -> bool {
        filters.iter().all(|filter| Self::matches(resource, filter))
    }

    pub fn matches(resource: &Resource, filter: &Filter) -> bool {
        let resolved = resolve_field(resource, &filter.field);
        let matched = match filter.operator {
            FilterOperator::Exists => {
                let expected = filter.value.as_bool().unwrap_or(true);
                resolved.is_some() == expected
            }
            FilterOperator::Eq => resolved.is_some_and(|v| v.loosely_equals(&filter.value)),
            FilterOperator::Ne => resolved.is_some_and(|v| !v.loosely_equals(&filter.value)),
            FilterOperator::Contains => match (resolved.as_ref(), &filter.value) {
                (Some(MetadataValue::String(actual)), MetadataValue::String(needle)) => {
                    actual.contains(needle.as_str())
                }
                _ => false,
            },
            FilterOperator::In => match (resolved, filter.value.list_items()) {
                (Some(actual), Some(candidates)) => {
                    candidates.iter().any(|candidate| actual.loosely_equals(candidate))
                }
                _ => false,
            },
        };

        trace!(
            resource = %resource.id,
            filter = %filter,
            matched,
            "Evaluated filter"
        );
        matched
    }
}

fn resolve_field(resource: &Resource, field: &str) -> Option<MetadataValue> {
    let fixed = match field {
        "id" => Some(resource.id.as_str()),
        "name" => Some(resource.name.as_str()),
        "type" => Some(resource.resource_type.as_str()),
        "provider" => Some(resource.provider.as_str()),
        "region" => Some(resource.region.as_str()),
        "zone" => Some(resource.zone.as_str()),
        _ => None,
    };
    if let Some(value) = fixed {
        return (!value.is_empty()).then(|| MetadataValue::String(value.to_string()));
    }

    if let Some(value) = resource.metadata.get(field) {
        return Some(value.clone());
    }
    if let Some(value) = resource.tags.get(field) {
        return Some(MetadataValue::String(value.clone()));
    }
    if let Some(key) = field.strip_prefix("tags.") {
        return resource.tags.get(key).map(|v| MetadataValue::String(v.clone()));
    }
    if let Some(key) = field.strip_prefix("metadata.") {
        return resource.metadata.get(key).cloned();
    }
    None
}
