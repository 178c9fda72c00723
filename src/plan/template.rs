// src/plan/template.rs

//! `${name}` variable references inside action text.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.-]*)\}").expect("variable reference regex is valid")
    })
}

/// Names referenced as `${name}` in `text`, in order of first appearance.
pub fn references(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in reference_regex().captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Replace every `${name}` whose value is known. Unknown references are left
/// untouched so that the operator can see what was not substituted.
pub fn expand(text: &str, values: &BTreeMap<String, String>) -> String {
    reference_regex()
        .replace_all(text, |caps: &Captures<'_>| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
