//! Impairment command builder -- turn a nested `netem` spec into tc/netem
//! command strings for the upstream and downstream directions.
//!
//! The netem grammar is a flat sequence of space-separated qualifier
//! keywords (`delay`, `loss`, `rate`, ...), each optionally followed by its
//! own sub-tokens. The YAML spec mirrors that shape: mapping keys become
//! keyword tokens, scalars become value tokens, sequences concatenate their
//! children in order. The reserved `params` key is silent -- its child is
//! inlined with no keyword token, for qualifiers that take bare positional
//! arguments (e.g. `delay 100 10`).
//!
//! No syntax checking happens here. Whether the emitted string is a command
//! netem will accept is the responsibility of whoever authors the case file.

use serde_yaml::Value;

use crate::cases::TestCase;

/// Mapping key whose children are inlined without emitting the key itself.
const SILENT_KEY: &str = "params";

/// Per-direction keys recognized inside the `netem` spec.
const UPSTREAM_KEY: &str = "upstream";
const DOWNSTREAM_KEY: &str = "downstream";

/// Build the (upstream, downstream) emulation command strings for a case.
///
/// A case without a `netem` spec (or with an explicit null) produces two
/// empty strings. A direction missing from the spec produces an empty
/// string for that direction only.
pub fn build_emulation_commands(case: &TestCase) -> (String, String) {
    let spec = match case.netem() {
        Some(v) if !v.is_null() => v,
        _ => return (String::new(), String::new()),
    };

    (direction_command(spec, UPSTREAM_KEY), direction_command(spec, DOWNSTREAM_KEY))
}

fn direction_command(spec: &Value, direction: &str) -> String {
    match spec.get(direction) {
        Some(v) => format!("netem{}", render(v)),
        None => String::new(),
    }
}

/// Recursively render one nested value as netem command tokens.
///
/// Every token carries its own leading space, so concatenation needs no
/// separator bookkeeping.
fn render(value: &Value) -> String {
    match value {
        Value::Mapping(map) => {
            let mut out = String::new();
            for (key, val) in map {
                let key = scalar_token(key);
                if key == SILENT_KEY {
                    out.push_str(&render(val));
                } else {
                    out.push(' ');
                    out.push_str(&key);
                    out.push_str(&render(val));
                }
            }
            out
        }
        Value::Sequence(seq) => seq.iter().map(render).collect(),
        scalar => format!(" {}", scalar_token(scalar)),
    }
}

/// String form of a scalar leaf: bare for strings, display form otherwise.
fn scalar_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        // Tagged or nested values have no scalar form; serialize flat.
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::TestCase;

    fn case_from_yaml(yaml: &str) -> TestCase {
        let doc: Value = serde_yaml::from_str(yaml).unwrap();
        TestCase::from_entry("test", doc).unwrap()
    }

    #[test]
    fn test_no_netem_key_yields_empty_commands() {
        let case = case_from_yaml(
            r#"
            client-cli: "-f json"
            server-cli: ""
            "#,
        );
        assert_eq!(build_emulation_commands(&case), (String::new(), String::new()));
    }

    #[test]
    fn test_explicit_null_netem_yields_empty_commands() {
        let case = case_from_yaml(
            r#"
            netem:
            client-cli: "-f json"
            server-cli: ""
            "#,
        );
        assert_eq!(build_emulation_commands(&case), (String::new(), String::new()));
    }

    #[test]
    fn test_upstream_delay_with_bare_param() {
        let case = case_from_yaml(
            r#"
            netem:
              upstream:
                delay:
                  params: 100
            client-cli: ""
            server-cli: ""
            "#,
        );
        let (up, down) = build_emulation_commands(&case);
        assert_eq!(up, "netem delay 100");
        assert_eq!(down, "");
    }

    #[test]
    fn test_param_list_and_sibling_qualifier() {
        let case = case_from_yaml(
            r#"
            netem:
              upstream:
                delay:
                  params: [100, 10]
                loss: 5
            client-cli: ""
            server-cli: ""
            "#,
        );
        let (up, _) = build_emulation_commands(&case);
        assert_eq!(up, "netem delay 100 10 loss 5");
    }

    #[test]
    fn test_both_directions_render_independently() {
        let case = case_from_yaml(
            r#"
            netem:
              upstream:
                loss: 1%
              downstream:
                rate: 10mbit
            client-cli: ""
            server-cli: ""
            "#,
        );
        let (up, down) = build_emulation_commands(&case);
        assert_eq!(up, "netem loss 1%");
        assert_eq!(down, "netem rate 10mbit");
    }

    #[test]
    fn test_nested_qualifier_keywords() {
        // Keyword sub-qualifiers keep their key tokens; only `params`
        // children are inlined.
        let case = case_from_yaml(
            r#"
            netem:
              downstream:
                delay:
                  params: [100ms, 20ms]
                  distribution: normal
            client-cli: ""
            server-cli: ""
            "#,
        );
        let (_, down) = build_emulation_commands(&case);
        assert_eq!(down, "netem delay 100ms 20ms distribution normal");
    }

    #[test]
    fn test_empty_mapping_renders_as_bare_keyword() {
        let case = case_from_yaml(
            r#"
            netem:
              upstream:
                ecn: {}
            client-cli: ""
            server-cli: ""
            "#,
        );
        let (up, _) = build_emulation_commands(&case);
        assert_eq!(up, "netem ecn");
    }

    #[test]
    fn test_params_only_mapping_emits_no_key_token() {
        let case = case_from_yaml(
            r#"
            netem:
              upstream:
                params: [reorder, 25%, 50%]
            client-cli: ""
            server-cli: ""
            "#,
        );
        let (up, _) = build_emulation_commands(&case);
        assert_eq!(up, "netem reorder 25% 50%");
        assert!(!up.contains("params"));
    }
}
