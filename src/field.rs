//! Field lookup and type resolution.

use prost_reflect::{
    DescriptorPool, DynamicMessage, ExtensionDescriptor, FieldDescriptor, Kind,
    MessageDescriptor, Value,
};

/// A message field or an extension of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// A field declared on the message.
    Regular(FieldDescriptor),
    /// An extension field.
    Extension(ExtensionDescriptor),
}

impl Field {
    /// The short field name.
    pub fn name(&self) -> &str {
        match self {
            Field::Regular(f) => f.name(),
            Field::Extension(e) => e.name(),
        }
    }

    /// The fully qualified field name.
    pub fn full_name(&self) -> &str {
        match self {
            Field::Regular(f) => f.full_name(),
            Field::Extension(e) => e.full_name(),
        }
    }

    /// The lowerCamelCase JSON name. Extensions use `[full.name]`.
    pub fn json_name(&self) -> &str {
        match self {
            Field::Regular(f) => f.json_name(),
            Field::Extension(e) => e.json_name(),
        }
    }

    /// The field number.
    pub fn number(&self) -> u32 {
        match self {
            Field::Regular(f) => f.number(),
            Field::Extension(e) => e.number(),
        }
    }

    /// The value kind of the field (the entry kind for maps).
    pub fn kind(&self) -> Kind {
        match self {
            Field::Regular(f) => f.kind(),
            Field::Extension(e) => e.kind(),
        }
    }

    /// Whether the field is `repeated` and not a map.
    pub fn is_list(&self) -> bool {
        match self {
            Field::Regular(f) => f.is_list(),
            Field::Extension(e) => e.is_list(),
        }
    }

    /// Whether the field is a map.
    pub fn is_map(&self) -> bool {
        match self {
            Field::Regular(f) => f.is_map(),
            Field::Extension(e) => e.is_map(),
        }
    }

    /// The key and value fields of a map entry.
    pub(crate) fn map_entry(&self) -> Option<(FieldDescriptor, FieldDescriptor)> {
        if !self.is_map() {
            return None;
        }
        let kind = self.kind();
        let entry = kind.as_message()?;
        Some((entry.map_entry_key_field(), entry.map_entry_value_field()))
    }

    pub(crate) fn get_mut<'a>(&self, message: &'a mut DynamicMessage) -> &'a mut Value {
        match self {
            Field::Regular(f) => message.get_field_mut(f),
            Field::Extension(e) => message.get_extension_mut(e),
        }
    }

    pub(crate) fn set(&self, message: &mut DynamicMessage, value: Value) {
        match self {
            Field::Regular(f) => message.set_field(f, value),
            Field::Extension(e) => message.set_extension(e, value),
        }
    }
}

impl From<FieldDescriptor> for Field {
    fn from(field: FieldDescriptor) -> Self {
        Field::Regular(field)
    }
}

impl From<ExtensionDescriptor> for Field {
    fn from(ext: ExtensionDescriptor) -> Self {
        Field::Extension(ext)
    }
}

/// Looks a key up by field name, then JSON name, then field number.
pub fn find_field(key: &str, message: &MessageDescriptor) -> Option<FieldDescriptor> {
    if let Some(field) = message.get_field_by_name(key) {
        return Some(field);
    }
    if let Some(field) = message.get_field_by_json_name(key) {
        return Some(field);
    }
    match key.parse::<i32>() {
        Ok(number) if number > 0 => message.get_field(number as u32),
        _ => None,
    }
}

/// Field names of a message for error messages: the first seven names,
/// followed by `...` once the limit is reached.
pub(crate) fn field_names(message: &MessageDescriptor) -> Vec<String> {
    truncate_names(message.fields().map(|f| f.name().to_string()))
}

pub(crate) fn truncate_names(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut result = Vec::new();
    for (i, name) in names.enumerate() {
        result.push(name);
        if i > 5 {
            result.push("...".to_string());
            break;
        }
    }
    result
}

/// Resolves message types for `Any` and extension fields.
pub trait TypeResolver: Send + Sync {
    /// Finds a message by fully qualified name.
    fn find_message_by_name(&self, name: &str) -> Option<MessageDescriptor>;

    /// Finds a message by type URL. The default strips everything up to the
    /// last `/`.
    fn find_message_by_url(&self, url: &str) -> Option<MessageDescriptor> {
        let name = url.rsplit_once('/').map_or(url, |(_, name)| name);
        self.find_message_by_name(name)
    }

    /// Finds an extension by fully qualified name.
    fn find_extension_by_name(&self, name: &str) -> Option<ExtensionDescriptor>;
}

impl TypeResolver for DescriptorPool {
    fn find_message_by_name(&self, name: &str) -> Option<MessageDescriptor> {
        self.get_message_by_name(name)
    }

    fn find_extension_by_name(&self, name: &str) -> Option<ExtensionDescriptor> {
        self.get_extension_by_name(name)
    }
}

/// The type URL under which a message is packed into an `Any`.
pub(crate) fn type_url(message: &MessageDescriptor) -> String {
    format!("type.googleapis.com/{}", message.full_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_reflect::ReflectMessage;

    #[test]
    fn names_are_truncated_after_seven() {
        let names = truncate_names((0..10).map(|i| format!("f{i}")));
        assert_eq!(names, ["f0", "f1", "f2", "f3", "f4", "f5", "f6", "..."]);
        let names = truncate_names((0..3).map(|i| format!("f{i}")));
        assert_eq!(names, ["f0", "f1", "f2"]);
    }

    #[test]
    fn lookup_by_name_json_name_and_number() {
        let desc = prost_types::FieldDescriptorProto::default().descriptor();
        assert_eq!(find_field("type_name", &desc).unwrap().name(), "type_name");
        assert_eq!(find_field("typeName", &desc).unwrap().name(), "type_name");
        assert_eq!(find_field("1", &desc).unwrap().name(), "name");
        assert!(find_field("-1", &desc).is_none());
        assert!(find_field("nope", &desc).is_none());
    }

    #[test]
    fn url_resolution_uses_last_segment() {
        let pool = prost_types::Duration::default().descriptor().parent_pool().clone();
        let found = pool
            .find_message_by_url("type.googleapis.com/google.protobuf.Duration")
            .unwrap();
        assert_eq!(found.full_name(), "google.protobuf.Duration");
        assert!(pool.find_message_by_url("example.com/nope.Missing").is_none());
    }
}
