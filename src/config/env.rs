use toml::{Table, Value};

/// Merges every `<PREFIX><SEP>...` environment variable into `table`.
///
/// The remainder of the key is split on `separator` and lowercased to form
/// the table path, so `XTENSA_DYNCONFIG__LIBRARY_DIR` lands at `library_dir`.
/// Values are kept as strings: every loader setting is textual, and coercing
/// a directory such as `2024` into an integer would break deserialization.
pub(super) fn load_env_vars(table: &mut Table, prefix: &str, separator: &str) {
    load_from(table, prefix, separator, std::env::vars());
}

fn load_from(
    table: &mut Table,
    prefix: &str,
    separator: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    let prefix_with_sep = format!("{prefix}{separator}");

    for (key, value) in vars {
        let Some(path_str) = key.strip_prefix(&prefix_with_sep) else {
            continue;
        };
        if path_str.is_empty() {
            continue;
        }

        let path: Vec<String> = path_str
            .split(separator)
            .map(|s| s.to_lowercase())
            .collect();
        merge_at_path(table, &path, Value::String(value));
    }
}

fn merge_at_path(table: &mut Table, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        table.insert(first.clone(), value);
        return;
    }

    if !matches!(table.get(first), Some(Value::Table(_))) {
        table.insert(first.clone(), Value::Table(Table::new()));
    }

    if let Some(Value::Table(nested)) = table.get_mut(first) {
        merge_at_path(nested, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_prefixed_vars_are_lowercased_into_paths() {
        let mut table = Table::new();
        load_from(
            &mut table,
            "XTENSA_DYNCONFIG",
            "__",
            vars(&[
                ("XTENSA_DYNCONFIG__LIBRARY_DIR", "/opt/xtensa/lib"),
                ("XTENSA_DYNCONFIG__NESTED__KEY", "v"),
                ("UNRELATED", "x"),
            ]),
        );

        assert_eq!(
            table.get("library_dir"),
            Some(&Value::String("/opt/xtensa/lib".into()))
        );
        let nested = table.get("nested").and_then(Value::as_table).unwrap();
        assert_eq!(nested.get("key"), Some(&Value::String("v".into())));
        assert!(table.get("unrelated").is_none());
    }

    #[test]
    fn test_bare_prefix_is_ignored() {
        let mut table = Table::new();
        load_from(
            &mut table,
            "XTENSA_DYNCONFIG",
            "__",
            vars(&[("XTENSA_DYNCONFIG__", "x"), ("XTENSA_DYNCONFIG", "y")]),
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_numeric_looking_values_stay_strings() {
        let mut table = Table::new();
        load_from(
            &mut table,
            "P",
            "__",
            vars(&[("P__TRACE_ENV", "2024")]),
        );
        assert_eq!(table.get("trace_env"), Some(&Value::String("2024".into())));
    }
}
