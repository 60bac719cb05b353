/// Placeholder naming shared by the update serializer and the filter builder
///
/// Name placeholders (`#field`) stand in for attribute names, value
/// placeholders (`:field`) for literal values. Both are derived from the
/// attribute name with non-word characters stripped; collisions get a numeric
/// suffix (`:field_2`, `:field_3`, ...).

use crate::{Error, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Za-z_]").expect("static pattern"));

/// Strip everything but ASCII word characters
fn clean(segment: &str) -> String {
    NON_WORD.replace_all(segment, "").into_owned()
}

/// `#segment`, with non-word characters removed
pub fn name_placeholder(segment: &str) -> String {
    format!("#{}", clean(segment))
}

/// Name placeholder for `segment` that does not clash with a different
/// attribute already registered in `names`.
///
/// Returns the existing placeholder when `segment` is already registered.
pub fn unique_name_placeholder(segment: &str, names: &HashMap<String, String>) -> String {
    let base = name_placeholder(segment);
    let mut candidate = base.clone();
    let mut idx = 1;

    while let Some(existing) = names.get(&candidate) {
        if existing == segment {
            break;
        }
        idx += 1;
        candidate = format!("{}_{}", base, idx);
    }

    candidate
}

/// Value placeholder derived from `path` that is not in `existing`
pub fn unique_value_name(path: &str, existing: &HashSet<String>) -> String {
    let base = format!(":{}", clean(&path.replace('.', "_")));
    let mut candidate = base.clone();
    let mut idx = 1;

    while existing.contains(&candidate) {
        idx += 1;
        candidate = format!("{}_{}", base, idx);
    }

    candidate
}

/// Placeholders for a dotted attribute path
#[derive(Debug, Clone, PartialEq)]
pub struct PathPlaceholders {
    /// Dot-joined placeholder chain used in the statement (`#a.#b.#c`)
    pub expression: String,
    /// `(placeholder, real segment)` for every segment, in path order
    pub names: Vec<(String, String)>,
}

/// Split `path` on `.` and give every segment its own name placeholder.
///
/// Segments that reduce to nothing after cleaning are rejected, since the
/// resulting `#` would not be a valid placeholder.
pub fn path_placeholders(path: &str, names: &HashMap<String, String>) -> Result<PathPlaceholders> {
    let mut assigned: HashMap<String, String> = HashMap::new();
    let mut chain = Vec::new();
    let mut out = Vec::new();

    for segment in path.split('.') {
        if clean(segment).is_empty() {
            return Err(Error::InvalidArgument(format!(
                "attribute path '{}' has an empty or non-word segment",
                path
            )));
        }

        // Earlier segments of this same path count as registered too
        let mut visible = names.clone();
        visible.extend(assigned.iter().map(|(k, v)| (k.clone(), v.clone())));

        let placeholder = unique_name_placeholder(segment, &visible);
        assigned.insert(placeholder.clone(), segment.to_string());
        chain.push(placeholder.clone());
        out.push((placeholder, segment.to_string()));
    }

    Ok(PathPlaceholders {
        expression: chain.join("."),
        names: out,
    })
}
