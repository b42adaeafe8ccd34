mod demos;

use std::path::Path;

use actionflow_engine::EngineConfig;
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::demos::Demo;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();
    let config = load_config(matches.get_one::<String>("config").map(String::as_str))?;

    match matches.subcommand() {
        Some(("demo", sub)) => run_demo(demo_arg(sub)?, config),
        Some(("graph", sub)) => print_graph(demo_arg(sub)?, config),
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let demo = || {
        Arg::new("demo")
            .required(true)
            .action(ArgAction::Set)
            .value_parser(Demo::NAMES)
            .help("Bundled demo workflow")
    };
    Command::new("actionflow")
        .about("Drive typed actions over a shared world state")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .action(ArgAction::Set)
                .help("Path to an engine configuration file (YAML or JSON)"),
        )
        .subcommand(Command::new("demo").about("Run a demo workflow and print its run summaries").arg(demo()))
        .subcommand(Command::new("graph").about("Print a demo's dependency diagram and renderer URL").arg(demo()))
}

fn demo_arg(matches: &ArgMatches) -> Result<Demo> {
    let name = matches.get_one::<String>("demo").context("expected a demo name")?;
    name.parse()
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_path(Path::new(path)).with_context(|| format!("loading configuration from {path}")),
        None => Ok(EngineConfig::default()),
    }
}

fn run_demo(demo: Demo, config: EngineConfig) -> Result<()> {
    let report = demo.run(config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_graph(demo: Demo, config: EngineConfig) -> Result<()> {
    let Some((diagram, url)) = demo.diagram(config)? else {
        anyhow::bail!("graph tracking is disabled in the configuration");
    };
    println!("{diagram}\n\n{url}");
    Ok(())
}
