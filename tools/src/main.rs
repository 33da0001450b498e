//! budget-runner: headless budget check for a source/attack dataset pair.
//!
//! Usage:
//!   budget-runner --source source.csv --attack attack.csv --quantiles quantiles.json
//!   budget-runner --budget 5 --config validator.json --explain

use anyhow::{anyhow, Result};
use budget_core::{config::ValidatorConfig, validator::check_files};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let source = flag_value(&args, "--source")?.unwrap_or("../sample_submission.csv");
    let attack = flag_value(&args, "--attack")?.unwrap_or("../naive_submission.csv");
    let quantiles = flag_value(&args, "--quantiles")?.unwrap_or("quantiles.json");
    let explain = args.iter().any(|a| a == "--explain");
    let config = build_config(&args)?;

    log::info!("source:    {source}");
    log::info!("attack:    {attack}");
    log::info!("quantiles: {quantiles}");
    log::info!("budget:    {}", config.budget);

    let verdict = check_files(&config, source, attack, quantiles)?;

    println!("{}", verdict.is_respected());
    if explain {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    }
    Ok(())
}

fn build_config(args: &[String]) -> Result<ValidatorConfig> {
    let mut config = match flag_value(args, "--config")? {
        Some(path) => ValidatorConfig::load(path)?,
        None => ValidatorConfig::default(),
    };
    if let Some(budget) = parse_arg::<u32>(args, "--budget")? {
        config = config.with_budget(budget);
    }
    Ok(config)
}

/// Value following `flag`. A flag given without a value is an error.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    match args.get(pos + 1) {
        Some(value) if !value.starts_with("--") => Ok(Some(value.as_str())),
        _ => Err(anyhow!("Missing value for {flag}")),
    }
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    flag_value(args, flag)?
        .map(|v| {
            v.parse()
                .map_err(|_| anyhow!("Cannot parse {flag} '{v}'"))
        })
        .transpose()
}
