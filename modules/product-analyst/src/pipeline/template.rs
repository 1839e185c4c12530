//! `{{var}}` placeholders in task descriptions.
//!
//! `{{config.a.b}}` is looked up in the pipeline document itself and
//! substituted at load time. Any other name is a runtime variable filled in
//! from [`PipelineInputs`](super::PipelineInputs) when the task runs. `\{{`
//! produces a literal `{{`.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Literal,
    Var(&'a str),
}

fn segments(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find("{{") {
        let escaped = pos > 0 && rest.as_bytes()[pos - 1] == b'\\';
        if escaped {
            out.push(Segment::Text(&rest[..pos - 1]));
            out.push(Segment::Literal);
            rest = &rest[pos + 2..];
            continue;
        }

        out.push(Segment::Text(&rest[..pos]));
        let after = &rest[pos + 2..];
        let Some(end) = after.find("}}") else {
            bail!("Unclosed template variable near: {{{{{}", truncate(after, 30));
        };
        let name = after[..end].trim();
        if name.is_empty() {
            bail!("Empty template variable");
        }
        out.push(Segment::Var(name));
        rest = &after[end + 2..];
    }

    out.push(Segment::Text(rest));
    Ok(out)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Substitute `{{config.*}}` from `doc`; leave runtime variables in place.
/// Fails on a config path that does not exist or on a runtime variable not
/// in `allowed_runtime`.
pub fn resolve_config_vars(
    template: &str,
    doc: &toml::Value,
    allowed_runtime: &[&str],
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for segment in segments(template)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            // Keep the escape so the runtime pass still sees a literal.
            Segment::Literal => out.push_str("\\{{"),
            Segment::Var(name) => match name.strip_prefix("config.") {
                Some(path) => {
                    let value = lookup(doc, path)
                        .with_context(|| format!("Config variable not found: {{{{{name}}}}}"))?;
                    out.push_str(&value_to_string(value));
                }
                None if allowed_runtime.contains(&name) => {
                    out.push_str("{{");
                    out.push_str(name);
                    out.push_str("}}");
                }
                None => bail!(
                    "Unknown template variable {{{{{name}}}}}; allowed: {allowed_runtime:?}"
                ),
            },
        }
    }
    Ok(out)
}

/// Fill runtime variables. Unknown names are left as written.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let Ok(parts) = segments(template) else {
        return template.to_string();
    };
    let mut out = String::with_capacity(template.len());
    for segment in parts {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Literal => out.push_str("{{"),
            Segment::Var(name) => match vars.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    out.push_str("{{");
                    out.push_str(name);
                    out.push_str("}}");
                }
            },
        }
    }
    out
}

fn lookup<'a>(doc: &'a toml::Value, path: &str) -> Option<&'a toml::Value> {
    path.split('.').try_fold(doc, |node, key| node.get(key))
}

fn value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> toml::Value {
        toml::from_str(
            r#"
            [context]
            market = "trail running shoes"
            regions = ["US", "EU"]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn config_vars_resolve_and_runtime_vars_survive() {
        let out = resolve_config_vars(
            "Compare {{ products }} in {{config.context.market}} ({{config.context.regions}})",
            &doc(),
            &["products"],
        )
        .unwrap();
        assert_eq!(out, "Compare {{products}} in trail running shoes (US, EU)");
    }

    #[test]
    fn unknown_names_are_rejected_at_load() {
        assert!(resolve_config_vars("{{product}}", &doc(), &["products"]).is_err());
        assert!(resolve_config_vars("{{config.context.nope}}", &doc(), &[]).is_err());
        assert!(resolve_config_vars("{{unclosed", &doc(), &[]).is_err());
    }

    #[test]
    fn render_fills_runtime_vars() {
        let vars = HashMap::from([("file_paths", "a.txt, b.txt")]);
        assert_eq!(render("Read {{file_paths}}.", &vars), "Read a.txt, b.txt.");
        assert_eq!(render("Keep {{other}}", &vars), "Keep {{other}}");
    }

    #[test]
    fn escaped_braces_stay_literal_through_both_passes() {
        let loaded = resolve_config_vars(r#"JSON: \{{"k": 1}}"#, &doc(), &[]).unwrap();
        assert_eq!(render(&loaded, &HashMap::new()), r#"JSON: {{"k": 1}}"#);
    }
}
