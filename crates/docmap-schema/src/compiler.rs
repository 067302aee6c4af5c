//! Projection of property trees onto store mapping definitions.

use serde_json::{Map, Value};

use crate::descriptor::PropertyTree;

/// Compile a property tree into the pure mapping the store expects.
///
/// Leaf options pass through unchanged. Embedded fields keep their own
/// options and gain a `properties` entry holding the compiled embedded tree.
/// Class identities never reach the output. The result is an independent
/// value: mutating it leaves the registry untouched.
pub fn compile(tree: &PropertyTree) -> Map<String, Value> {
    tree.iter()
        .map(|(name, descriptor)| {
            let mut mapping = descriptor.options.clone();
            if let Some(embedded) = &descriptor.embedded {
                mapping.insert(
                    "properties".into(),
                    Value::Object(compile(&embedded.properties)),
                );
            }
            (name.clone(), Value::Object(mapping))
        })
        .collect()
}
