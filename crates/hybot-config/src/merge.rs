//! Layer merging.

use serde_yaml::Value;

/// Recursively merge `overlay` into `base`.
///
/// Mappings merge per key. Scalars and sequences from the overlay replace
/// the base value. A null overlay (an empty or comment-only file) is a no-op.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {},
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if let Some(base_val) = base_map.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_map.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}
