//! Input resolution strategies for script steps.
//!
//! A [`ScriptStep`](crate::ScriptStep) does not decide where its inputs come
//! from. It is handed an [`InputResolver`] at construction and asks it for
//! the mapping of its stage when it runs.

use std::collections::BTreeMap;

use crate::context::RunnerContext;
use crate::error::StateError;
use crate::state::{Inputs, Stage};

/// Caller-supplied variables layered over the calculated inputs.
pub type ExtraVars = BTreeMap<String, String>;

/// Resolves the input mapping for a stage.
pub trait InputResolver: Send + Sync {
    fn resolve(&self, ctx: &RunnerContext, stage: Stage) -> Result<Inputs, StateError>;
}

impl<F> InputResolver for F
where
    F: Fn(&RunnerContext, Stage) -> Result<Inputs, StateError> + Send + Sync,
{
    fn resolve(&self, ctx: &RunnerContext, stage: Stage) -> Result<Inputs, StateError> {
        self(ctx, stage)
    }
}

/// Reads the calculated inputs for the stage as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatedInputs;

impl InputResolver for CalculatedInputs {
    fn resolve(&self, ctx: &RunnerContext, stage: Stage) -> Result<Inputs, StateError> {
        let inputs = ctx.deployment_state().calculated_inputs(stage)?;
        Ok(Inputs::clone(&inputs))
    }
}

/// Calculated inputs with extra variables layered on top.
#[derive(Debug, Clone, Default)]
pub struct OverlayInputs {
    extra_vars: ExtraVars,
}

impl OverlayInputs {
    pub fn new(extra_vars: ExtraVars) -> Self {
        Self { extra_vars }
    }

    pub fn extra_vars(&self) -> &ExtraVars {
        &self.extra_vars
    }
}

impl InputResolver for OverlayInputs {
    fn resolve(&self, ctx: &RunnerContext, stage: Stage) -> Result<Inputs, StateError> {
        let calculated = ctx.deployment_state().calculated_inputs(stage)?;
        let merged = merge_inputs(&calculated, &self.extra_vars);
        tracing::debug!(
            %stage,
            calculated = calculated.len(),
            overlay = self.extra_vars.len(),
            merged = merged.len(),
            "Resolved overlay inputs"
        );
        Ok(merged)
    }
}

/// Copy `calculated` into a fresh mapping and overlay `extra_vars` on it.
///
/// Overlay values win on key collision. Keys only present in `calculated`
/// are always kept.
pub fn merge_inputs(calculated: &Inputs, extra_vars: &ExtraVars) -> Inputs {
    let mut merged = calculated.clone();
    for (key, value) in extra_vars {
        merged.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputSink;
    use crate::state::DeploymentState;
    use serde_json::json;
    use std::sync::Arc;

    fn inputs(pairs: &[(&str, serde_json::Value)]) -> Inputs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn vars(pairs: &[(&str, &str)]) -> ExtraVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ctx_with(state: DeploymentState) -> RunnerContext {
        RunnerContext::new(Arc::new(state), ".").with_output(OutputSink::Discard)
    }

    #[test]
    fn test_merge_precedence() {
        let calculated = inputs(&[("a", json!("1")), ("b", json!("2"))]);
        let overlay = vars(&[("b", "9"), ("c", "3")]);

        let merged = merge_inputs(&calculated, &overlay);
        assert_eq!(
            merged,
            inputs(&[("a", json!("1")), ("b", json!("9")), ("c", json!("3"))])
        );
    }

    #[test]
    fn test_merge_keeps_non_string_calculated_values() {
        let calculated = inputs(&[("replicas", json!(3)), ("tags", json!(["a", "b"]))]);
        let merged = merge_inputs(&calculated, &ExtraVars::new());
        assert_eq!(merged, calculated);
    }

    #[test]
    fn test_merge_empty_both() {
        assert!(merge_inputs(&Inputs::new(), &ExtraVars::new()).is_empty());
    }

    #[test]
    fn test_overlay_does_not_mutate_state() {
        let calculated = inputs(&[("a", json!("1")), ("b", json!("2"))]);
        let state = DeploymentState::new().with_stage(Stage::Deploy, calculated.clone());
        let ctx = ctx_with(state);

        let resolver = OverlayInputs::new(vars(&[("b", "9"), ("c", "3")]));
        let merged = resolver.resolve(&ctx, Stage::Deploy).unwrap();
        assert_eq!(merged["b"], json!("9"));

        let after = ctx.deployment_state().calculated_inputs(Stage::Deploy).unwrap();
        assert_eq!(*after, calculated);
    }

    #[test]
    fn test_overlay_propagates_missing_stage() {
        let ctx = ctx_with(DeploymentState::new());
        let err = OverlayInputs::default()
            .resolve(&ctx, Stage::Deploy)
            .unwrap_err();
        assert!(matches!(err, StateError::StageMissing(Stage::Deploy)));
    }

    #[test]
    fn test_calculated_inputs_passthrough() {
        let calculated = inputs(&[("host", json!("db.internal"))]);
        let ctx = ctx_with(DeploymentState::new().with_stage(Stage::Build, calculated.clone()));

        assert_eq!(CalculatedInputs.resolve(&ctx, Stage::Build).unwrap(), calculated);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |_ctx: &RunnerContext, stage: Stage| -> Result<Inputs, StateError> {
            Ok(inputs(&[("stage", json!(stage.as_str()))]))
        };
        let ctx = ctx_with(DeploymentState::new());
        let resolved = resolver.resolve(&ctx, Stage::Build).unwrap();
        assert_eq!(resolved["stage"], json!("build"));
    }
}
