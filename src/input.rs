//! Command line inputs shared by the tools: the program, the analysis
//! configuration and the method filters.

use crate::prelude::*;
use clap::ArgMatches;
use regex::Regex;
use std::fs;

pub fn load_program(args: &ArgMatches) -> FwResult<Program> {
    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| FwError::BadArguments("--input needed".to_string()))?;
    let program = model::open(input_fname)?;
    log::info!(
        "{} loaded: {} classes",
        input_fname,
        program.classes.len()
    );
    Ok(program)
}

/// Reads the options file, if any, then applies the command line
/// overrides.
pub fn analysis_config(args: &ArgMatches) -> FwResult<AnalysisConfig> {
    let mut config = match args.get_one::<String>("options") {
        Some(fname) => AnalysisConfig::from_options(&fs::read_to_string(fname)?)?,
        None => AnalysisConfig::default(),
    };
    let overrides = [
        ("interprocedural", "interprocedural_analysis_kind"),
        ("max-depth", "max_interprocedural_method_call_chain"),
        ("pessimistic", "pessimistic_analysis"),
    ];
    for (arg, key) in overrides {
        if let Some(value) = args.get_one::<String>(arg) {
            config.apply_option(key, value)?;
        }
    }
    log::debug!("analysis configuration: {:?}", config);
    Ok(config)
}

/// Class and method name filters.
pub struct MethodFilter {
    class: Regex,
    method: Regex,
}

impl MethodFilter {
    pub fn from_args(args: &ArgMatches) -> FwResult<Self> {
        let pattern = |arg: &str| {
            Regex::new(args.get_one::<String>(arg).map_or(".*", String::as_str))
        };
        let class = pattern("filter-class")?;
        let method = pattern("filter-method")?;
        log::debug!(
            "filtering on class pattern '{}', method pattern '{}'",
            class,
            method
        );
        Ok(Self { class, method })
    }

    /// Filtered methods that have a body.
    pub fn methods<'r, 'a>(&'r self, repo: &'r Repo<'a>) -> Vec<&'r Method<'a>> {
        repo.find_classes(&self.class)
            .flat_map(|class| class.find_methods(&self.method, repo))
            .filter(|method| method.body().is_some())
            .collect()
    }
}
