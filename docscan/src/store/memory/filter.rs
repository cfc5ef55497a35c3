use crate::common::document_utils::{bson_equals, compare_bson, get_path, type_rank};
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use bson::{Bson, Document};
use std::cmp::Ordering;

/// Evaluates a query filter against a document.
///
/// Supports implicit equality on (dotted) fields, the comparison operators
/// `$eq $ne $gt $gte $lt $lte $in $nin $exists`, and top-level `$and`/`$or`.
pub(crate) fn matches(document: &Document, filter: &Document) -> DocScanResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            operator if operator.starts_with('$') => {
                return Err(unsupported(operator));
            }
            field => matches_condition(get_path(document, field), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(operator: &str, condition: &'a Bson) -> DocScanResult<Vec<&'a Document>> {
    let invalid = || {
        log::error!("{} expects a non-empty array of documents", operator);
        DocScanError::new(
            &format!("{} expects a non-empty array of documents", operator),
            ErrorKind::InvalidArgument,
        )
    };

    match condition {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Bson::Document(clause) => Ok(clause),
                _ => Err(invalid()),
            })
            .collect(),
        _ => Err(invalid()),
    }
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(inner) if inner.keys().next().is_some_and(|key| key.starts_with('$')) => {
            Some(inner)
        }
        _ => None,
    }
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> DocScanResult<bool> {
    let operators = match is_operator_document(condition) {
        Some(operators) => operators,
        None => return Ok(value_equals(value, condition)),
    };

    for (operator, operand) in operators {
        let matched = match operator.as_str() {
            "$eq" => value_equals(value, operand),
            "$ne" => !value_equals(value, operand),
            "$gt" => value_compares(value, operand, |o| o == Ordering::Greater),
            "$gte" => value_compares(value, operand, |o| o != Ordering::Less),
            "$lt" => value_compares(value, operand, |o| o == Ordering::Less),
            "$lte" => value_compares(value, operand, |o| o != Ordering::Greater),
            "$in" => candidates(operator, operand)?
                .iter()
                .any(|candidate| value_equals(value, candidate)),
            "$nin" => !candidates(operator, operand)?
                .iter()
                .any(|candidate| value_equals(value, candidate)),
            "$exists" => is_truthy(operand) == value.is_some(),
            other => return Err(unsupported(other)),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn candidates<'a>(operator: &str, operand: &'a Bson) -> DocScanResult<&'a Vec<Bson>> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => {
            log::error!("{} expects an array", operator);
            Err(DocScanError::new(
                &format!("{} expects an array", operator),
                ErrorKind::InvalidArgument,
            ))
        }
    }
}

/// A missing field equals null; an array field equals a scalar it contains.
fn value_equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_equals(item, expected))
        }
        Some(actual) => bson_equals(actual, expected),
    }
}

/// Ordering operators only compare values of the same type bracket.
fn value_compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let compare = |actual: &Bson| {
        type_rank(actual) == type_rank(operand) && accept(compare_bson(actual, operand))
    };
    match value {
        None => false,
        Some(Bson::Array(items)) if !matches!(operand, Bson::Array(_)) => items.iter().any(compare),
        Some(actual) => compare(actual),
    }
}

pub(crate) fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(v) => *v != 0,
        Bson::Int64(v) => *v != 0,
        Bson::Double(v) => *v != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn unsupported(operator: &str) -> DocScanError {
    log::error!("Unsupported query operator {}", operator);
    DocScanError::new(
        &format!("Unsupported query operator {}", operator),
        ErrorKind::InvalidArgument,
    )
}
