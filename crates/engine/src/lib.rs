//! # Actionflow Engine
//!
//! A small action-selection engine. Actions declare the typed parameters they
//! consume and produce; the engine keeps a world state of live values, finds
//! the actions that state can feed, lets a selection policy pick one, runs it
//! and folds its outputs back into the state until a terminal action has run.
//!
//! ## Usage
//!
//! ```rust
//! use actionflow_engine::{Engine, Outputs, PreferAction};
//!
//! let mut engine: Engine<()> = Engine::new(PreferAction::new(["finish"]));
//! engine.action("increment", false, "count once", |action| {
//!     action.produces::<i64>("counter").body(|_| Ok(Outputs::one(1_i64)))
//! })?;
//! engine.action("finish", true, "stop once counted", |action| {
//!     action.requires::<i64>("counter").body(|_| Ok(Outputs::none()))
//! })?;
//!
//! let summary = engine.run((), None)?;
//! assert_eq!(summary.trail, vec!["increment", "finish"]);
//! assert_eq!(engine.store().get_as::<i64>("counter"), Some(&1));
//! # Ok::<(), actionflow_engine::EngineError>(())
//! ```
//!
//! ## Architecture
//!
//! - **`action`**: action descriptors, their builder and body adapters
//! - **`store`**: the world state
//! - **`engine`**: registration, cascade invalidation and the run loop
//! - **`graph`**: producer/consumer graph and its Mermaid rendering
//! - **`config`**: optional engine configuration
//! - **`error`**: the engine's error type

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod store;

pub use action::{Action, ActionBuilder, Inputs, Outputs};
pub use actionflow_types::{Declaration, DeclarationSet, InputParam, OutputParam, Param, ParamValue, TypeTag, Update};
pub use config::EngineConfig;
pub use engine::{BASE_PARAM, Engine, EntryPoint, FirstCandidate, PreferAction, RunSummary, SelectionPolicy};
pub use error::{EngineError, Result};
pub use graph::{ActionNode, DependencyGraph, Displayable};
pub use store::WorldState;
