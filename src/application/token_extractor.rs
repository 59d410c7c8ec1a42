// Token reference extraction and substitution for `$name$` / `$$name$$` placeholders
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

// The double form is tried first at each position so `$$name$$` is never read as `$name$`.
static TOKEN_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$([A-Za-z_][A-Za-z0-9_.]*)\$\$|\$([A-Za-z_][A-Za-z0-9_.]*)\$")
        .expect("token reference pattern is valid")
});

/// Distinct placeholder names referenced by `text`, in both delimiter forms
pub fn extract_token_names(text: &str) -> BTreeSet<String> {
    TOKEN_REFERENCE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Replace every resolved placeholder. All `$$name$$` occurrences are replaced
/// before any `$name$`; names without a value are left untouched.
pub fn substitute_tokens(text: &str, values: &HashMap<String, String>) -> String {
    let double_replaced = replace_form(text, values, 1);
    replace_form(&double_replaced, values, 2)
}

fn replace_form(text: &str, values: &HashMap<String, String>, group: usize) -> String {
    TOKEN_REFERENCE
        .replace_all(text, |caps: &Captures| {
            caps.get(group)
                .and_then(|name| values.get(name.as_str()))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
