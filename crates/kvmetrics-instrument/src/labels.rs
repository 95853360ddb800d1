//! Per-node attribute sets

use kvmetrics_core::ClientOptions;
use opentelemetry::KeyValue;

use crate::semconv;

/// Build the attributes attached to every measurement of one node
///
/// The static attributes come first, followed by `pool.name`: the explicit
/// pool name when given, otherwise the node's address.
pub fn node_attributes(
    base: &[KeyValue],
    pool_name: Option<&str>,
    options: &ClientOptions,
) -> Vec<KeyValue> {
    let pool_name = pool_name.unwrap_or_else(|| options.addr()).to_string();

    let mut attributes = Vec::with_capacity(base.len() + 1);
    attributes.extend_from_slice(base);
    attributes.push(KeyValue::new(semconv::POOL_NAME, pool_name));
    attributes
}

/// Copy `base` and append one attribute
pub(crate) fn with_attribute(base: &[KeyValue], extra: KeyValue) -> Vec<KeyValue> {
    let mut attributes = Vec::with_capacity(base.len() + 1);
    attributes.extend_from_slice(base);
    attributes.push(extra);
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_name_defaults_to_address() {
        let options = ClientOptions::new("10.1.0.7:6379");
        let attributes = node_attributes(&[], None, &options);
        assert_eq!(attributes, vec![KeyValue::new("pool.name", "10.1.0.7:6379")]);
    }

    #[test]
    fn test_explicit_pool_name_used_verbatim() {
        let options = ClientOptions::new("10.1.0.7:6379");
        let attributes = node_attributes(&[], Some("sessions"), &options);
        assert_eq!(attributes, vec![KeyValue::new("pool.name", "sessions")]);
    }

    #[test]
    fn test_custom_attributes_come_first() {
        let base = [KeyValue::new("region", "eu"), KeyValue::new("tier", "cache")];
        let attributes = node_attributes(&base, None, &ClientOptions::new("a:1"));
        assert_eq!(
            attributes,
            vec![
                KeyValue::new("region", "eu"),
                KeyValue::new("tier", "cache"),
                KeyValue::new("pool.name", "a:1"),
            ]
        );
    }
}
