use crate::common::document_utils::{get_path, remove_path, set_path};
use crate::common::DOC_ID;
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use bson::{Bson, Document};

/// Applies an update document to `document` in place and reports whether
/// anything changed.
///
/// Only operator updates are accepted: `$set`, `$unset` and `$inc`.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> DocScanResult<bool> {
    validate_update(update)?;

    let mut modified = false;
    for (operator, fields) in update {
        let fields = match fields {
            Bson::Document(fields) => fields,
            _ => {
                return Err(invalid_update(&format!(
                    "{} expects a document of fields",
                    operator
                )))
            }
        };

        for (path, value) in fields {
            if path == DOC_ID {
                return Err(invalid_update("The _id field is immutable"));
            }

            modified |= match operator.as_str() {
                "$set" => {
                    let changed = get_path(document, path)
                        .map(|current| current != value)
                        .unwrap_or(true);
                    set_path(document, path, value.clone())?;
                    changed
                }
                "$unset" => remove_path(document, path).is_some(),
                "$inc" => {
                    let current = get_path(document, path).cloned().unwrap_or(Bson::Int32(0));
                    let sum = increment(path, &current, value)?;
                    set_path(document, path, sum)?;
                    true
                }
                other => {
                    return Err(invalid_update(&format!("Unsupported update operator {}", other)));
                }
            };
        }
    }
    Ok(modified)
}

/// Rejects replacement-style or empty update documents.
pub(crate) fn validate_update(update: &Document) -> DocScanResult<()> {
    if update.is_empty() {
        return Err(invalid_update("Update document is empty"));
    }
    if let Some(field) = update.keys().find(|key| !key.starts_with('$')) {
        return Err(invalid_update(&format!(
            "Update document field {} is not an update operator",
            field
        )));
    }
    Ok(())
}

fn increment(path: &str, current: &Bson, delta: &Bson) -> DocScanResult<Bson> {
    let sum = match (current, delta) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        },
        (Bson::Int32(a), Bson::Int64(b)) => checked_i64(path, i64::from(*a), *b)?,
        (Bson::Int64(a), Bson::Int32(b)) => checked_i64(path, *a, i64::from(*b))?,
        (Bson::Int64(a), Bson::Int64(b)) => checked_i64(path, *a, *b)?,
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + f64::from(*b)),
        (Bson::Double(a), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(f64::from(*a) + b),
        (Bson::Int64(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        _ => {
            log::error!("Cannot increment field {} of value {} by {}", path, current, delta);
            return Err(DocScanError::new(
                &format!("Cannot apply $inc to field {} with a non-numeric value", path),
                ErrorKind::InvalidOperation,
            ));
        }
    };
    Ok(sum)
}

fn checked_i64(path: &str, a: i64, b: i64) -> DocScanResult<Bson> {
    match a.checked_add(b) {
        Some(sum) => Ok(Bson::Int64(sum)),
        None => {
            log::error!("Increment of field {} overflows", path);
            Err(DocScanError::new(
                &format!("Increment of field {} overflows a 64-bit integer", path),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}

fn invalid_update(message: &str) -> DocScanError {
    log::error!("{}", message);
    DocScanError::new(message, ErrorKind::InvalidArgument)
}
