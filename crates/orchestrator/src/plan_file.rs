//! TOML plan definitions.
//!
//! A plan file declares external inputs and the steps of one provisioning
//! flow:
//!
//! ```toml
//! [inputs]
//! dev_wallet = "0xF25AbDb08ff0e0e5561198A53F1325dcfBE92428"
//!
//! [[steps]]
//! name = "factory"
//! action = "./deploy/factory.sh"
//!
//! [[steps]]
//! name = "creator"
//! action = "./deploy/creator.sh"
//! depends_on = ["factory", "dev_wallet"]
//! idempotency_key = "DaapNFTCreator"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use rollout_core::{ActionRef, Plan, Step};

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    inputs: BTreeMap<String, String>,
    #[serde(default)]
    steps: Vec<StepSpec>,
}

#[derive(Debug, Deserialize)]
struct StepSpec {
    name: String,
    action: String,
    #[serde(default)]
    depends_on: Vec<String>,
    idempotency_key: Option<String>,
}

/// Parse a plan definition. Duplicate step names are rejected here; graph
/// validation happens in `Plan::validate`.
pub fn parse_plan(content: &str) -> Result<Plan> {
    let file: PlanFile = toml::from_str(content)?;

    let mut plan = Plan::new();
    for (name, value) in file.inputs {
        plan.declare_input(name, value);
    }
    for spec in file.steps {
        let mut step = Step::new(spec.name, ActionRef::new(spec.action));
        for dep in spec.depends_on {
            step = step.with_dependency(dep);
        }
        if let Some(key) = spec.idempotency_key {
            step = step.with_idempotency_key(key);
        }
        plan.add_step(step)?;
    }

    Ok(plan)
}

pub fn load_plan(path: impl AsRef<Path>) -> Result<Plan> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| {
        OrchestratorError::PlanFileRead {
            path: path.to_path_buf(),
            source,
        }
    })?;
    parse_plan(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_core::PlanError;

    #[test]
    fn test_parse_full_plan() {
        let plan = parse_plan(
            r#"
[inputs]
dev_wallet = "0xF25A"

[[steps]]
name = "factory"
action = "./deploy/factory.sh"

[[steps]]
name = "creator"
action = "./deploy/creator.sh"
depends_on = ["factory", "dev_wallet"]
idempotency_key = "DaapNFTCreator"
"#,
        )
        .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.inputs().get("dev_wallet").unwrap(), "0xF25A");

        let creator = plan.step("creator").unwrap();
        assert_eq!(creator.idempotency_key, "DaapNFTCreator");
        assert!(creator.depends_on.contains("factory"));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let plan = parse_plan(
            r#"
[[steps]]
name = "factory"
action = "deploy-factory"
"#,
        )
        .unwrap();

        let step = plan.step("factory").unwrap();
        assert_eq!(step.idempotency_key, "factory");
        assert!(step.depends_on.is_empty());
        assert!(plan.inputs().is_empty());
    }

    #[test]
    fn test_empty_plan_parses() {
        let plan = parse_plan("").unwrap();
        assert!(plan.is_empty());
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let err = parse_plan(
            r#"
[[steps]]
name = "factory"
action = "a"

[[steps]]
name = "factory"
action = "b"
"#,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::Validation(PlanError::DuplicateStep(_))
        ));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(matches!(
            parse_plan("[[steps]]\nname = "),
            Err(OrchestratorError::PlanFileParse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_plan("/nonexistent/plan.toml"),
            Err(OrchestratorError::PlanFileRead { .. })
        ));
    }
}
