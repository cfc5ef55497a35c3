use crate::common::document_utils::{get_path, remove_path, set_path};
use crate::common::DOC_ID;
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use crate::store::memory::filter::is_truthy;
use bson::Document;

/// A validated projection document.
///
/// A projection either includes the listed fields or excludes them; `_id`
/// is returned unless explicitly excluded, and is the only field that may be
/// excluded from an inclusion projection.
#[derive(Debug, Clone)]
pub(crate) struct Projection {
    fields: Vec<String>,
    inclusive: bool,
    include_id: bool,
}

impl Projection {
    pub(crate) fn parse(projection: &Document) -> DocScanResult<Projection> {
        let mut fields = Vec::new();
        let mut mode: Option<bool> = None;
        let mut include_id = true;

        for (field, flag) in projection {
            let include = is_truthy(flag);
            if field == DOC_ID {
                include_id = include;
                continue;
            }

            match mode {
                Some(inclusive) if inclusive != include => {
                    log::error!("Projection {} mixes inclusion and exclusion", projection);
                    return Err(DocScanError::new(
                        "Projection cannot mix inclusion and exclusion",
                        ErrorKind::InvalidArgument,
                    ));
                }
                _ => mode = Some(include),
            }
            fields.push(field.clone());
        }

        Ok(Projection {
            fields,
            // `{ "_id": 0 }` alone excludes `_id` and keeps the rest
            inclusive: mode.unwrap_or(false),
            include_id,
        })
    }

    pub(crate) fn apply(&self, document: &Document) -> DocScanResult<Document> {
        let mut projected = if self.inclusive {
            let mut projected = Document::new();
            if self.include_id {
                if let Some(id) = document.get(DOC_ID) {
                    projected.insert(DOC_ID, id.clone());
                }
            }
            for field in &self.fields {
                if let Some(value) = get_path(document, field) {
                    set_path(&mut projected, field, value.clone())?;
                }
            }
            projected
        } else {
            let mut projected = document.clone();
            for field in &self.fields {
                remove_path(&mut projected, field);
            }
            projected
        };

        if !self.include_id {
            projected.remove(DOC_ID);
        }
        Ok(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn user() -> Document {
        doc! {
            "_id": 1,
            "username": "zhangsan",
            "age": 18,
            "address": { "city": "Beijing", "zip": "100000" },
        }
    }

    #[test]
    fn inclusion_keeps_listed_fields_and_id() {
        let projection = Projection::parse(&doc! { "username": 1, "address.city": 1 }).unwrap();
        assert_eq!(
            projection.apply(&user()).unwrap(),
            doc! { "_id": 1, "username": "zhangsan", "address": { "city": "Beijing" } }
        );
    }

    #[test]
    fn inclusion_can_drop_id() {
        let projection = Projection::parse(&doc! { "username": 1, "_id": 0 }).unwrap();
        assert_eq!(projection.apply(&user()).unwrap(), doc! { "username": "zhangsan" });
    }

    #[test]
    fn exclusion_removes_listed_fields() {
        let projection = Projection::parse(&doc! { "age": 0, "address.zip": 0 }).unwrap();
        assert_eq!(
            projection.apply(&user()).unwrap(),
            doc! { "_id": 1, "username": "zhangsan", "address": { "city": "Beijing" } }
        );
    }

    #[test]
    fn id_only_exclusion_keeps_everything_else() {
        let projection = Projection::parse(&doc! { "_id": false }).unwrap();
        let projected = projection.apply(&user()).unwrap();
        assert!(!projected.contains_key("_id"));
        assert_eq!(projected.len(), 3);
    }

    #[test]
    fn mixed_projection_is_rejected() {
        let err = Projection::parse(&doc! { "username": 1, "age": 0 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }
}
