//! ---
//! dmc_section: "05-networking-external-interfaces"
//! dmc_subsection: "binary"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Step scripts replayed through the slide and widget players."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use dmc_common::DEFAULT_TARGET;
use dmc_core::{DirectMediaController, PlaySettings};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Slide,
    Widget,
    Score,
    Clear,
}

/// One host intent, applied in file order.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    pub context: String,
    #[serde(default)]
    pub calling_context: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub settings: PlaySettings,
    /// New score for `score` steps.
    #[serde(default)]
    pub value: Option<i64>,
    /// Display for `score` steps; defaults to the main display.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read script {}", path.display()))?;
        contents
            .parse()
            .with_context(|| format!("invalid script {}", path.display()))
    }
}

impl std::str::FromStr for Script {
    type Err = anyhow::Error;

    fn from_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// Replay `script`, returning one summary line per step.
///
/// Play failures abort the run; teardown failures are reported and skipped.
pub async fn execute(controller: &DirectMediaController, script: &Script) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let number = index + 1;
        let calling_context = step.calling_context.as_deref();
        let line = match step.kind {
            StepKind::Slide => {
                let outcome = controller
                    .slide_player()
                    .play(&step.settings, &step.context, calling_context, step.priority)
                    .await
                    .with_context(|| format!("step {} (slide, context '{}')", number, step.context))?;
                let shown: Vec<_> = outcome
                    .shown
                    .iter()
                    .map(|slide| format!("{}#{}", slide.name(), slide.slide_id()))
                    .collect();
                format!(
                    "step {}: slide [{}] shown=[{}] removed=[{}]",
                    number,
                    step.context,
                    shown.join(", "),
                    outcome.removed.join(", ")
                )
            }
            StepKind::Widget => {
                let outcome = controller
                    .widget_player()
                    .play(&step.settings, &step.context, calling_context, step.priority)
                    .await
                    .with_context(|| format!("step {} (widget, context '{}')", number, step.context))?;
                let slides: Vec<_> = outcome
                    .attached
                    .iter()
                    .map(|slide| format!("{}#{}", slide.name(), slide.slide_id()))
                    .collect();
                format!(
                    "step {}: widget [{}] {} widget(s) attached to [{}]",
                    number,
                    step.context,
                    step.settings.len(),
                    slides.join(", ")
                )
            }
            StepKind::Score => {
                let value = step
                    .value
                    .ok_or_else(|| anyhow!("step {} (score) has no value", number))?;
                let target = step.target.as_deref().unwrap_or(DEFAULT_TARGET);
                let slide = controller
                    .widget_player()
                    .refresh_score(value, target)
                    .await
                    .with_context(|| format!("step {} (score, target '{}')", number, target))?;
                format!(
                    "step {}: score {} on {}#{}",
                    number,
                    dmc_core::format_score(value),
                    slide.name(),
                    slide.slide_id()
                )
            }
            StepKind::Clear => {
                let report = controller.slide_player().clear_context(&step.context).await;
                for failure in &report.failures {
                    warn!(
                        step = number,
                        slide = failure.name.as_str(),
                        error = %failure.error,
                        "teardown failure"
                    );
                }
                format!(
                    "step {}: clear [{}] removed=[{}] failures={}",
                    number,
                    step.context,
                    report.removed.join(", "),
                    report.failures.len()
                )
            }
        };
        info!(step = number, "{}", line);
        lines.push(line);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dmc_common::AppConfig;
    use dmc_core::{ControllerBuilder, InMemoryTransport, RpcOperation};

    use super::*;

    const CONFIG: &str = r#"
        [slides.intro]
        widgets = ["title"]

        [widgets.title]
        label = { text = "Hello {player.name}" }

        [widgets.ball]
        rectangle = { width = 4.0, height = 4.0 }

        [widgets.score_widget]
        label = { text = "{score}" }
    "#;

    const SCRIPT: &str = r#"
        [[steps]]
        kind = "slide"
        context = "attract"
        [steps.settings.intro]
        action = "play"
        player = { name = "Ada" }

        [[steps]]
        kind = "widget"
        context = "attract"
        [steps.settings.ball]
        action = "play"

        [[steps]]
        kind = "score"
        context = "attract"
        value = 12500

        [[steps]]
        kind = "clear"
        context = "attract"
    "#;

    #[tokio::test]
    async fn script_runs_against_in_memory_transport() {
        let config: AppConfig = CONFIG.parse().expect("config");
        let transport = InMemoryTransport::new();
        let controller = ControllerBuilder::new(Arc::new(transport.clone()))
            .with_config(&config)
            .build()
            .expect("controller");
        let script: Script = SCRIPT.parse().expect("script");

        let lines = execute(&controller, &script).await.expect("script runs");
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("intro#1"), "{}", lines[0]);
        assert!(lines[2].contains("score 12,500 on intro#1"), "{}", lines[2]);
        assert!(lines[3].contains("removed=[intro]"), "{}", lines[3]);
        assert_eq!(transport.count(RpcOperation::AttachWidgets), 2);
        assert!(transport.live_slides().is_empty());
    }

    #[tokio::test]
    async fn failing_step_is_named() {
        let config: AppConfig = CONFIG.parse().expect("config");
        let controller = ControllerBuilder::new(Arc::new(InMemoryTransport::new()))
            .with_config(&config)
            .build()
            .expect("controller");
        let script: Script = "[[steps]]\nkind = \"slide\"\ncontext = \"game\"\n[steps.settings.credits]\naction = \"play\"\n"
            .parse()
            .expect("script");

        let err = execute(&controller, &script).await.unwrap_err();
        assert!(format!("{err:#}").contains("step 1"));
    }

    #[test]
    fn unknown_step_kind_is_rejected() {
        assert!("[[steps]]\nkind = \"explode\"\ncontext = \"x\"\n"
            .parse::<Script>()
            .is_err());
    }

    #[test]
    fn settings_without_action_are_rejected() {
        let raw = "[[steps]]\nkind = \"slide\"\ncontext = \"x\"\n[steps.settings.intro]\n";
        assert!(raw.parse::<Script>().is_err());
    }

    #[tokio::test]
    async fn score_step_requires_a_value() {
        let config: AppConfig = CONFIG.parse().expect("config");
        let controller = ControllerBuilder::new(Arc::new(InMemoryTransport::new()))
            .with_config(&config)
            .build()
            .expect("controller");
        let script: Script = "[[steps]]\nkind = \"score\"\ncontext = \"game\"\n"
            .parse()
            .expect("script");

        let err = execute(&controller, &script).await.unwrap_err();
        assert!(format!("{err:#}").contains("has no value"), "{err:#}");
    }

    #[test]
    fn script_loads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("attract.toml");
        fs::write(&path, SCRIPT).expect("write script");

        let script = Script::from_path(&path).expect("script loads");
        let kinds: Vec<_> = script.steps.iter().map(|step| step.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Slide, StepKind::Widget, StepKind::Score, StepKind::Clear]
        );
        assert_eq!(script.steps[2].value, Some(12_500));

        let missing = dir.path().join("missing.toml");
        let err = Script::from_path(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("unable to read script"), "{err:#}");
    }
}
