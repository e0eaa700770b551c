//! Serializer
//!
//! Turns entities into the `data` payload: base attributes, then each
//! included association nested under its name, then each computed attribute.
//! A computed attribute the entity does not provide is left out.

use serde_json::{Map, Value};

use crate::resource::Entity;

/// Serialization options declared by a resource
#[derive(Debug, Clone, Copy)]
pub struct Serializer<'a> {
    associations: &'a [&'a str],
    computed: &'a [&'a str],
}

impl<'a> Serializer<'a> {
    /// Serializer nesting `associations` and adding `computed` attributes
    pub fn new(associations: &'a [&'a str], computed: &'a [&'a str]) -> Self {
        Self {
            associations,
            computed,
        }
    }

    /// Serialize one entity into an object
    pub fn one<E: Entity>(&self, entity: &E) -> Value {
        let mut object: Map<String, Value> = entity.attributes();

        for name in self.associations {
            let nested = entity.association(name).unwrap_or(Value::Null);
            object.insert((*name).to_string(), nested);
        }

        for name in self.computed {
            if let Some(value) = entity.computed(name) {
                object.insert((*name).to_string(), value);
            }
        }

        Value::Object(object)
    }

    /// Serialize a sequence into an array, preserving order
    pub fn many<E: Entity>(&self, entities: &[E]) -> Value {
        Value::Array(entities.iter().map(|entity| self.one(entity)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldErrors;
    use serde_json::json;

    #[derive(Debug, Clone)]
    struct Book {
        title: String,
        pages: u32,
    }

    impl Entity for Book {
        fn id(&self) -> Option<String> {
            Some("1".into())
        }

        fn set_id(&mut self, _id: String) {}

        fn attributes(&self) -> Map<String, Value> {
            let mut map = Map::new();
            map.insert("id".into(), json!("1"));
            map.insert("title".into(), json!(self.title));
            map
        }

        fn association(&self, name: &str) -> Option<Value> {
            (name == "author").then(|| json!({"name": "Ursula"}))
        }

        fn computed(&self, name: &str) -> Option<Value> {
            (name == "long").then(|| json!(self.pages > 300))
        }

        fn build(_attributes: &Map<String, Value>) -> Result<Self, FieldErrors> {
            Err(FieldErrors::new())
        }

        fn assign(&mut self, _attributes: &Map<String, Value>) -> Result<(), FieldErrors> {
            Ok(())
        }
    }

    fn book() -> Book {
        Book {
            title: "The Dispossessed".into(),
            pages: 387,
        }
    }

    #[test]
    fn test_base_attributes_only() {
        let value = Serializer::new(&[], &[]).one(&book());
        assert_eq!(value, json!({"id": "1", "title": "The Dispossessed"}));
    }

    #[test]
    fn test_associations_and_computed() {
        let value = Serializer::new(&["author"], &["long"]).one(&book());
        assert_eq!(value["author"], json!({"name": "Ursula"}));
        assert_eq!(value["long"], json!(true));
    }

    #[test]
    fn test_missing_association_is_null_and_missing_computed_is_skipped() {
        let value = Serializer::new(&["publisher"], &["rating"]).one(&book());
        let object = value.as_object().unwrap();
        assert_eq!(object.get("publisher"), Some(&Value::Null));
        assert!(!object.contains_key("rating"));
    }

    #[test]
    fn test_many_preserves_order() {
        let mut second = book();
        second.title = "Lathe of Heaven".into();
        let value = Serializer::new(&[], &[]).many(&[book(), second]);
        assert_eq!(value[0]["title"], "The Dispossessed");
        assert_eq!(value[1]["title"], "Lathe of Heaven");
    }
}
