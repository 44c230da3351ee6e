//! JSON helpers for document text.
//!
//! Serialization is restricted to persistence-eligible fields by
//! construction: a document's saved view is whatever its serde
//! implementation emits (see [`crate::schema::Persistable`]).

use serde_json::Value;

use crate::error::SandbankError;
use crate::schema::Persistable;

/// The JSON object holding an instance's saveable fields.
pub(crate) fn saved_value<T: Persistable>(instance: &T) -> Result<Value, SandbankError> {
    let value = serde_json::to_value(instance)?;
    if !value.is_object() {
        return Err(SandbankError::Schema(format!(
            "document type {} does not serialize to a JSON object",
            T::type_label()
        )));
    }
    Ok(value)
}

/// Render a JSON value to file text.
pub(crate) fn render(value: &Value, indent: bool) -> Result<String, SandbankError> {
    let text = if indent {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

/// Parse file text into a generic JSON value.
pub(crate) fn parse(text: &str) -> Result<Value, SandbankError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Default)]
    struct Doc {
        uid: String,
        level: u8,
    }

    impl Persistable for Doc {
        fn uid(&self) -> &str { &self.uid }
        fn set_uid(&mut self, uid: String) { self.uid = uid; }
    }

    #[test]
    fn test_saved_value_is_object() {
        let value = saved_value(&Doc { uid: "u".into(), level: 3 }).unwrap();
        assert_eq!(value["uid"], "u");
        assert_eq!(value["level"], 3);
    }

    #[test]
    fn test_render_parse_round_trip() {
        let value = saved_value(&Doc { uid: "u".into(), level: 9 }).unwrap();

        for indent in [true, false] {
            let text = render(&value, indent).unwrap();
            assert_eq!(parse(&text).unwrap(), value);
        }
    }

    #[test]
    fn test_indented_output_is_multiline() {
        let value = saved_value(&Doc::default()).unwrap();

        assert!(render(&value, true).unwrap().contains('\n'));
        assert!(!render(&value, false).unwrap().contains('\n'));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(parse("{not json").is_err());
    }
}
