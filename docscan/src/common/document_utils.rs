use crate::common::FIELD_SEPARATOR;
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use bson::{Bson, Document};
use std::cmp::Ordering;

/// Resolves a dotted field path such as `address.city`.
pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split(FIELD_SEPARATOR);
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => {
                let index = segment.parse::<usize>().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Writes `value` at a dotted field path, creating embedded documents on the way.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DocScanResult<()> {
    match path.split_once(FIELD_SEPARATOR) {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                other => {
                    log::error!("Cannot set field {} through non-document value {}", path, other);
                    Err(DocScanError::new(
                        &format!(
                            "Cannot set field '{}': '{}' is not an embedded document",
                            path, head
                        ),
                        ErrorKind::InvalidOperation,
                    ))
                }
            }
        }
    }
}

/// Removes the value at a dotted field path, returning it when present.
pub(crate) fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once(FIELD_SEPARATOR) {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(inner)) => remove_path(inner, rest),
            _ => None,
        },
    }
}

pub(crate) fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

/// NaN sorts below every other number and equals itself.
fn compare_doubles(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

// 2^63, exactly representable as f64
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Compares an integer with a double without rounding the integer.
fn compare_int_double(x: i64, y: f64) -> Ordering {
    if y.is_nan() {
        return Ordering::Greater;
    }
    if y >= I64_BOUND {
        return Ordering::Less;
    }
    if y < -I64_BOUND {
        return Ordering::Greater;
    }
    let whole = y.trunc();
    x.cmp(&(whole as i64))
        .then_with(|| 0.0_f64.partial_cmp(&(y - whole)).unwrap_or(Ordering::Equal))
}

fn as_str(value: &Bson) -> Option<&str> {
    match value {
        Bson::String(v) => Some(v.as_str()),
        Bson::Symbol(v) => Some(v.as_str()),
        _ => None,
    }
}

/// Total order over BSON values: values of different types order by type
/// (null < numbers < strings < documents < arrays < ... ), numbers compare by
/// magnitude regardless of their width, with NaN below every other number.
pub(crate) fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => i64::from(*x).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&i64::from(*y)),
        (Bson::Double(x), Bson::Double(y)) => compare_doubles(*x, *y),
        (Bson::Int32(x), Bson::Double(y)) => compare_int_double(i64::from(*x), *y),
        (Bson::Int64(x), Bson::Double(y)) => compare_int_double(*x, *y),
        (Bson::Double(x), Bson::Int32(y)) => compare_int_double(i64::from(*y), *x).reverse(),
        (Bson::Double(x), Bson::Int64(y)) => compare_int_double(*y, *x).reverse(),
        (Bson::Document(x), Bson::Document(y)) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let ordering = kx.cmp(ky).then_with(|| compare_bson(vx, vy));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Array(x), Bson::Array(y)) => {
            for (vx, vy) in x.iter().zip(y.iter()) {
                let ordering = compare_bson(vx, vy);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Binary(x), Bson::Binary(y)) => x.bytes.cmp(&y.bytes),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            x.time.cmp(&y.time).then(x.increment.cmp(&y.increment))
        }
        _ => {
            if let (Some(x), Some(y)) = (as_str(a), as_str(b)) {
                return x.cmp(y);
            }
            a.to_string().cmp(&b.to_string())
        }
    }
}

/// Equality that treats numbers of different widths as equal when their
/// values are.
pub(crate) fn bson_equals(a: &Bson, b: &Bson) -> bool {
    if is_number(a) && is_number(b) {
        compare_bson(a, b) == Ordering::Equal
    } else {
        a == b
    }
}

/// Rewrites numbers into one canonical form so that values `bson_equals`
/// treats as equal encode to the same bytes. Integral doubles become
/// `Int64`, and so do `Int32` values.
pub(crate) fn canonical_key(value: &Bson) -> Bson {
    match value {
        Bson::Int32(v) => Bson::Int64(i64::from(*v)),
        Bson::Double(v) if v.is_nan() => Bson::Double(f64::NAN),
        Bson::Double(v) if v.fract() == 0.0 && *v >= -I64_BOUND && *v < I64_BOUND => {
            Bson::Int64(*v as i64)
        }
        Bson::Document(inner) => Bson::Document(
            inner
                .iter()
                .map(|(key, value)| (key.clone(), canonical_key(value)))
                .collect(),
        ),
        Bson::Array(items) => Bson::Array(items.iter().map(canonical_key).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn get_path_walks_embedded_documents_and_arrays() {
        let document = doc! {
            "name": "alice",
            "address": { "city": "Lisbon", "geo": { "lat": 38.7 } },
            "tags": ["a", "b"],
        };

        assert_eq!(get_path(&document, "name"), Some(&Bson::String("alice".into())));
        assert_eq!(get_path(&document, "address.city"), Some(&Bson::String("Lisbon".into())));
        assert_eq!(get_path(&document, "address.geo.lat"), Some(&Bson::Double(38.7)));
        assert_eq!(get_path(&document, "tags.1"), Some(&Bson::String("b".into())));
        assert_eq!(get_path(&document, "address.zip"), None);
        assert_eq!(get_path(&document, "name.first"), None);
    }

    #[test]
    fn set_path_creates_intermediate_documents() {
        let mut document = doc! { "name": "alice" };
        set_path(&mut document, "address.city", Bson::String("Porto".into())).unwrap();
        assert_eq!(document, doc! { "name": "alice", "address": { "city": "Porto" } });
    }

    #[test]
    fn set_path_rejects_scalar_parent() {
        let mut document = doc! { "name": "alice" };
        let err = set_path(&mut document, "name.first", Bson::Int32(1)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn remove_path_returns_removed_value() {
        let mut document = doc! { "address": { "city": "Porto", "zip": "4000" } };
        assert_eq!(remove_path(&mut document, "address.zip"), Some(Bson::String("4000".into())));
        assert_eq!(remove_path(&mut document, "address.zip"), None);
        assert_eq!(document, doc! { "address": { "city": "Porto" } });
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert_eq!(compare_bson(&Bson::Int32(5), &Bson::Int64(5)), Ordering::Equal);
        assert_eq!(compare_bson(&Bson::Int32(5), &Bson::Double(5.5)), Ordering::Less);
        assert_eq!(compare_bson(&Bson::Int64(9), &Bson::Int32(3)), Ordering::Greater);
        assert!(bson_equals(&Bson::Int32(7), &Bson::Double(7.0)));
        assert!(!bson_equals(&Bson::Int32(7), &Bson::String("7".into())));
    }

    #[test]
    fn nan_sorts_below_every_number() {
        let mut values = Vec::new();
        for i in 0..60 {
            values.push(match i % 4 {
                0 => Bson::Double(f64::NAN),
                1 => Bson::Int32(30 - i),
                2 => Bson::Int64(i64::from(i) * 3),
                _ => Bson::Double(f64::from(i) / 2.0 - 10.0),
            });
        }
        values.sort_by(compare_bson);

        let nan_count = values
            .iter()
            .take_while(|value| matches!(value, Bson::Double(v) if v.is_nan()))
            .count();
        assert_eq!(nan_count, 15);
        for pair in values.windows(2) {
            assert_ne!(compare_bson(&pair[0], &pair[1]), Ordering::Greater);
        }

        let nan = Bson::Double(f64::NAN);
        assert_eq!(compare_bson(&nan, &nan), Ordering::Equal);
        assert_eq!(compare_bson(&nan, &Bson::Int64(i64::MIN)), Ordering::Less);
        assert_eq!(compare_bson(&Bson::Int32(0), &nan), Ordering::Greater);
        assert_eq!(compare_bson(&nan, &Bson::Null), Ordering::Greater);
    }

    #[test]
    fn large_integers_compare_exactly_with_doubles() {
        let big = 1i64 << 53;
        let ordering = compare_bson(&Bson::Int64(big + 1), &Bson::Double(big as f64));
        assert_eq!(ordering, Ordering::Greater);
        assert_eq!(compare_bson(&Bson::Double(2.5), &Bson::Int32(2)), Ordering::Greater);
        assert_eq!(compare_bson(&Bson::Int32(-2), &Bson::Double(-2.5)), Ordering::Greater);
        assert_eq!(compare_bson(&Bson::Int64(i64::MAX), &Bson::Double(1e19)), Ordering::Less);
        assert_eq!(compare_bson(&Bson::Double(-0.0), &Bson::Int32(0)), Ordering::Equal);
    }

    #[test]
    fn canonical_key_merges_numeric_widths() {
        assert_eq!(canonical_key(&Bson::Int32(7)), Bson::Int64(7));
        assert_eq!(canonical_key(&Bson::Double(7.0)), Bson::Int64(7));
        assert_eq!(canonical_key(&Bson::Double(7.5)), Bson::Double(7.5));
        assert_eq!(
            canonical_key(&Bson::Document(doc! { "a": 1, "b": [2.0, "x"] })),
            Bson::Document(doc! { "a": 1i64, "b": [2i64, "x"] })
        );
    }

    #[test]
    fn types_order_null_numbers_strings() {
        assert_eq!(compare_bson(&Bson::Null, &Bson::Int32(0)), Ordering::Less);
        assert_eq!(compare_bson(&Bson::Int32(100), &Bson::String("a".into())), Ordering::Less);
        assert_eq!(compare_bson(&Bson::String("z".into()), &Bson::Boolean(false)), Ordering::Less);
    }

    #[test]
    fn object_ids_order_by_creation() {
        let first = ObjectId::from_bytes([0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
        let second = ObjectId::from_bytes([0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(compare_bson(&Bson::ObjectId(first), &Bson::ObjectId(second)), Ordering::Less);
    }
}
