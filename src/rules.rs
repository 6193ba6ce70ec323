use std::cmp::Ordering;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LibError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Number,
    Boolean,
}

/// A flat "left path, comparator, right operand" predicate evaluated against
/// a payload object. Side-effect free; shares nothing with the tree store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub path: String,
    pub comparator: Comparator,
    pub value_kind: ValueKind,
    pub operand: Value,
}

pub fn lookup_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

pub fn evaluate(condition: &Condition, payload: &Value) -> Result<bool> {
    let left = lookup_path(payload, &condition.path).ok_or_else(|| {
        LibError::invalid_with_code(
            "rule_path_unresolved",
            "Condition path did not resolve against the payload",
            anyhow!("no value at path {:?}", condition.path),
        )
    })?;

    match condition.comparator {
        Comparator::Eq => coerced_eq(condition.value_kind, left, &condition.operand),
        Comparator::Neq => {
            coerced_eq(condition.value_kind, left, &condition.operand).map(|equal| !equal)
        }
        Comparator::Gt => {
            coerced_cmp(condition.value_kind, left, &condition.operand)
                .map(|ordering| ordering == Ordering::Greater)
        }
        Comparator::Lt => {
            coerced_cmp(condition.value_kind, left, &condition.operand)
                .map(|ordering| ordering == Ordering::Less)
        }
        Comparator::Gte => {
            coerced_cmp(condition.value_kind, left, &condition.operand)
                .map(|ordering| ordering != Ordering::Less)
        }
        Comparator::Lte => {
            coerced_cmp(condition.value_kind, left, &condition.operand)
                .map(|ordering| ordering != Ordering::Greater)
        }
        Comparator::In => {
            let Value::Array(members) = &condition.operand else {
                return Err(LibError::invalid_with_code(
                    "rule_operand_not_list",
                    "The in comparator requires a list operand",
                    anyhow!("operand was {:?}", condition.operand),
                ));
            };
            for member in members {
                if coerced_eq(condition.value_kind, left, member)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Comparator::Contains => {
            if let Value::Array(members) = left {
                for member in members {
                    if coerced_eq(condition.value_kind, member, &condition.operand)? {
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
            let haystack = coerce_text(left)
                .ok_or_else(|| type_mismatch(condition.value_kind, left))?;
            let needle = coerce_text(&condition.operand)
                .ok_or_else(|| type_mismatch(condition.value_kind, &condition.operand))?;
            Ok(haystack.contains(&needle))
        }
    }
}

fn coerced_eq(kind: ValueKind, left: &Value, right: &Value) -> Result<bool> {
    match kind {
        ValueKind::Number => Ok(coerce_number(left)
            .ok_or_else(|| type_mismatch(kind, left))?
            == coerce_number(right).ok_or_else(|| type_mismatch(kind, right))?),
        ValueKind::Text => Ok(coerce_text(left).ok_or_else(|| type_mismatch(kind, left))?
            == coerce_text(right).ok_or_else(|| type_mismatch(kind, right))?),
        ValueKind::Boolean => Ok(coerce_boolean(left)
            .ok_or_else(|| type_mismatch(kind, left))?
            == coerce_boolean(right).ok_or_else(|| type_mismatch(kind, right))?),
    }
}

fn coerced_cmp(kind: ValueKind, left: &Value, right: &Value) -> Result<Ordering> {
    match kind {
        ValueKind::Number => {
            let left = coerce_number(left).ok_or_else(|| type_mismatch(kind, left))?;
            let right = coerce_number(right).ok_or_else(|| type_mismatch(kind, right))?;
            left.partial_cmp(&right).ok_or_else(|| {
                LibError::invalid_with_code(
                    "rule_type_mismatch",
                    "Condition values were not comparable numbers",
                    anyhow!("partial_cmp failed for {left} and {right}"),
                )
            })
        }
        ValueKind::Text => {
            let left = coerce_text(left).ok_or_else(|| type_mismatch(kind, left))?;
            let right = coerce_text(right).ok_or_else(|| type_mismatch(kind, right))?;
            Ok(left.cmp(&right))
        }
        ValueKind::Boolean => Err(LibError::invalid_with_code(
            "rule_comparator_unsupported",
            "Ordering comparators require text or number operands",
            anyhow!("ordering requested for boolean operands"),
        )),
    }
}

fn type_mismatch(kind: ValueKind, value: &Value) -> LibError {
    LibError::invalid_with_code(
        "rule_type_mismatch",
        "Condition value could not be coerced to the declared type",
        anyhow!("{:?} did not coerce to {:?}", value, kind),
    )
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn coerce_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
