//! Pass 3: Finalization -- turn preserve-marked names into output
//! identifiers.
//!
//! Direct references, attribute references, and substitution placeholders
//! whose key carries the preserve marker are re-emitted in the same form
//! with the bare name. Every other node passes through unchanged, so
//! running the pass twice is a no-op.

use crate::ast::Value;
use crate::config::LinkerConfig;
use crate::error::StructuralError;
use crate::expr::{self, Form};
use crate::graph::ModuleGraph;
use crate::walk::{walk, NodePath};

pub fn finalize(graph: &mut ModuleGraph, config: &LinkerConfig) -> Result<(), StructuralError> {
    for entity in graph.entities_mut() {
        finalize_value(&mut entity.reference, &entity.full_name, config)?;
        if let Some(definition) = &mut entity.definition {
            finalize_value(definition, &entity.full_name, config)?;
        }
    }
    Ok(())
}

pub fn finalize_value(
    value: &mut Value,
    root: &str,
    config: &LinkerConfig,
) -> Result<(), StructuralError> {
    walk(value, root, &mut |node, path| finalize_node(node, path, config))
}

fn finalize_node(node: &mut Value, path: &NodePath, config: &LinkerConfig) -> Result<(), StructuralError> {
    let replacement = match Form::recognize(node, path)? {
        Some(Form::Reference(key)) => config.strip_preserve(key).map(expr::reference),
        Some(Form::Attribute(key, attribute)) => config
            .strip_preserve(key)
            .map(|bare| expr::attribute(bare, attribute)),
        Some(Form::Substitution(pattern, args)) => {
            let rewritten = expr::replace_placeholders(pattern, |name, attribute| {
                config
                    .strip_preserve(name)
                    .map(|bare| expr::placeholder(bare, attribute))
            });
            (rewritten != pattern)
                .then(|| expr::substitution(rewritten, args.cloned().unwrap_or_default()))
        }
        None => None,
    };
    if let Some(value) = replacement {
        *node = value;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finalize_json(json: serde_json::Value) -> serde_json::Value {
        let mut value = Value::from_json(json);
        finalize_value(&mut value, "E", &LinkerConfig::default()).unwrap();
        value.to_json()
    }

    #[test]
    fn strips_marker_in_every_form() {
        assert_eq!(finalize_json(json!({"Ref": "@Bucket"})), json!({"Ref": "Bucket"}));
        assert_eq!(
            finalize_json(json!({"Fn::GetAtt": ["@Bucket", "Arn"]})),
            json!({"Fn::GetAtt": ["Bucket", "Arn"]})
        );
        assert_eq!(
            finalize_json(json!({"Fn::Sub": ["${@Bucket.Arn}/${P0}", {"P0": {"Ref": "@Queue"}}]})),
            json!({"Fn::Sub": ["${Bucket.Arn}/${P0}", {"P0": {"Ref": "Queue"}}]})
        );
    }

    #[test]
    fn unmarked_nodes_pass_through() {
        let input = json!({"a": {"Ref": "AWS::Region"}, "b": {"Fn::Sub": "${AWS::StackName}"}, "c": [1]});
        assert_eq!(finalize_json(input.clone()), input);
    }

    #[test]
    fn second_run_is_identity() {
        let once = finalize_json(json!([{"Ref": "@A"}, {"Fn::Sub": "${@B}-${!Literal}"}]));
        assert_eq!(finalize_json(once.clone()), once);
    }
}
