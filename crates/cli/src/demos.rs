//! Bundled demo workflows.

use std::{
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use actionflow_engine::{Action, BASE_PARAM, Engine, EngineConfig, EntryPoint, InputParam, OutputParam, Outputs, PreferAction, TypeTag};
use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    Counter,
    Pipeline,
}

impl Demo {
    pub const NAMES: [&'static str; 2] = ["counter", "pipeline"];

    pub fn name(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Pipeline => "pipeline",
        }
    }

    /// Run the demo and describe what happened.
    pub fn run(self, config: EngineConfig) -> Result<Value> {
        info!(demo = self.name(), "running demo");
        match self {
            Self::Counter => run_counter(config),
            Self::Pipeline => run_pipeline(config),
        }
    }

    /// Mermaid payload and renderer URL, `None` when graph tracking is off.
    pub fn diagram(self, config: EngineConfig) -> Result<Option<(String, String)>> {
        let rendered = match self {
            Self::Counter => {
                let engine = counter_engine(config)?;
                engine.display().zip(engine.diagram_url())
            }
            Self::Pipeline => {
                let engine = pipeline_engine(config)?;
                engine.display().zip(engine.diagram_url())
            }
        };
        Ok(rendered)
    }
}

impl FromStr for Demo {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "counter" => Ok(Self::Counter),
            "pipeline" => Ok(Self::Pipeline),
            other => Err(anyhow!("unknown demo '{other}', expected one of {}", Demo::NAMES.join(", "))),
        }
    }
}

#[derive(Default)]
struct CounterState {
    finished: AtomicBool,
}

fn counter_engine(config: EngineConfig) -> Result<Engine<CounterState>> {
    let mut engine = Engine::with_config(PreferAction::new(["finish"]), config);
    engine.action("increment", false, "Set the counter to one", |action| {
        action.produces::<i64>("counter").body(|_| Ok(Outputs::one(1_i64)))
    })?;
    engine.action("finish", true, "Stop once the counter exists", |action| {
        action.requires::<CounterState>(BASE_PARAM).requires::<i64>("counter").body(|inputs| {
            inputs.get::<CounterState>(BASE_PARAM)?.finished.store(true, Ordering::SeqCst);
            Ok(Outputs::none())
        })
    })?;
    Ok(engine)
}

fn run_counter(config: EngineConfig) -> Result<Value> {
    let mut engine = counter_engine(config)?;
    let summary = engine.run(CounterState::default(), None)?;
    Ok(json!({
        "demo": Demo::Counter.name(),
        "runs": [summary],
        "counter": engine.store().get_as::<i64>("counter"),
        "finished": engine.base_state().is_some_and(|state| state.finished.load(Ordering::SeqCst)),
    }))
}

const PAGES: [(&str, &str); 2] = [
    ("https://example.com/rust", "Rust is a language empowering everyone to build reliable and efficient software."),
    ("https://example.com/tokio", "Tokio is an asynchronous runtime for Rust."),
];

fn pipeline_engine(config: EngineConfig) -> Result<Engine<()>> {
    let preferred = ["report", "parse", "fetch"];
    let mut engine = Engine::with_config(
        move |_: &(), candidates: &[&Action]| {
            preferred.iter().find_map(|name| candidates.iter().position(|candidate| candidate.name() == *name))
        },
        config,
    );

    engine.action("fetch", false, "Download the page at `url`", |action| {
        action
            .requires::<String>("url")
            .output(OutputParam::new("page", TypeTag::of::<String>()).cascading(true))
            .suspendable_body(|inputs| async move {
                let url = inputs.get::<String>("url")?;
                tokio::time::sleep(Duration::from_millis(10)).await;
                let (_, page) = PAGES.iter().find(|(known, _)| known == url).with_context(|| format!("no page at {url}"))?;
                Ok::<_, anyhow::Error>(Outputs::one(page.to_string()))
            })
    })?;
    engine.action("parse", false, "Count the words of the current page", |action| {
        action
            .input(InputParam::new("page", TypeTag::of::<String>()).with_deps(["word_count"]))
            .produces::<usize>("word_count")
            .body(|inputs| Ok(Outputs::one(inputs.get::<String>("page")?.split_whitespace().count())))
    })?;
    engine.action("report", true, "Summarize the page", |action| {
        action
            .requires::<String>("url")
            .requires::<usize>("word_count")
            .produces::<String>("report")
            .body(|inputs| Ok(Outputs::one(format!("{}: {} words", inputs.get::<String>("url")?, inputs.get::<usize>("word_count")?))))
    })?;
    Ok(engine)
}

/// Fetch two pages in turn. The second fetch replaces `page`, whose cascade
/// drops the stale `word_count`, so `parse` has to run again before `report`.
fn run_pipeline(config: EngineConfig) -> Result<Value> {
    let mut engine = pipeline_engine(config)?;
    let mut runs = Vec::new();
    let mut reports = Vec::new();
    for (url, _) in PAGES {
        let entry = EntryPoint::new("fetch").kwarg("url", url.to_string());
        runs.push(engine.run((), Some(entry))?);
        reports.push(engine.store().get_as::<String>("report").cloned());
    }
    Ok(json!({
        "demo": Demo::Pipeline.name(),
        "runs": runs,
        "reports": reports,
    }))
}
