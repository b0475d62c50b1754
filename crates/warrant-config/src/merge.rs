//! Layer merging.

/// Recursively merge `overlay` into `base`.
///
/// Tables merge key by key. Scalars and arrays in the overlay replace the
/// base value outright.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                match base_table.get_mut(key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => {
                        base_table.insert(key.clone(), overlay_val.clone());
                    },
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Set the value at a dotted path, creating intermediate tables.
pub(crate) fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut node = root;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        let toml::Value::Table(table) = node else {
            return;
        };
        if parts.peek().is_none() {
            table.insert(part.to_owned(), value);
            return;
        }
        node = table
            .entry(part.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_tables_merge_scalars_replace() {
        let mut base = parse("[a]\nx = 1\ny = 2\nlist = [1, 2]\n");
        deep_merge(&mut base, &parse("[a]\ny = 3\nlist = [9]\n[b]\nz = true\n"));
        assert_eq!(base, parse("[a]\nx = 1\ny = 3\nlist = [9]\n[b]\nz = true\n"));
    }

    #[test]
    fn test_set_path_creates_tables() {
        let mut root = parse("");
        set_path(&mut root, "storage.path", toml::Value::String("db".into()));
        assert_eq!(root, parse("[storage]\npath = \"db\"\n"));
    }
}
