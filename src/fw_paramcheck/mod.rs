use crate::analysis::param_validation::ParameterValidationResult;
use crate::input::{analysis_config, load_program, MethodFilter};
use crate::prelude::*;
use clap::ArgMatches;
use nu_ansi_term::Color;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Hazard {
    method: String,
    parameter: String,
    index: u16,
    operation: String,
    line: Option<u32>,
    column: Option<u32>,
}

pub fn run(args: &ArgMatches) -> FwResult<()> {
    init_logger(args);

    let program = load_program(args)?;
    let repo = Repo::new(&program)?;
    let filter = MethodFilter::from_args(args)?;
    let session = AnalysisSession::new(&repo, analysis_config(args)?);

    let all = args.get_flag("all");
    let methods: Vec<_> = filter
        .methods(&repo)
        .into_iter()
        .filter(|method| all || method.is_public())
        .collect();
    log::info!("parameter validation of {} methods", methods.len());

    let results: Vec<_> = methods
        .par_iter()
        .map(|&method| (method, session.analyze::<ParameterValidationResult>(method)))
        .collect();

    let mut nb_success = 0;
    let mut nb_fails = 0;
    let mut last_res = Ok(());
    let mut hazards = Vec::new();
    for (method, res) in results {
        match res {
            Ok(result) => {
                nb_success += 1;
                for (index, usage) in result.hazardous_parameter_usages() {
                    let parameter = method
                        .parameters()
                        .get(*index as usize)
                        .map_or_else(|| format!("p{index}"), |parameter| parameter.name.clone());
                    hazards.push(Hazard {
                        method: method.to_string(),
                        parameter,
                        index: *index,
                        operation: usage.operation.to_string(),
                        line: usage.span.map(|span| span.line),
                        column: usage.span.map(|span| span.column),
                    });
                }
            }
            Err(err) => {
                log::error!("{method}: {err}");
                nb_fails += 1;
                last_res = Err(err.into());
            }
        }
    }

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&hazards)?);
    } else if hazards.is_empty() {
        println!("{}", Color::Green.paint("no hazardous parameter usage found"));
    } else {
        for hazard in &hazards {
            let location = match (hazard.line, hazard.column) {
                (Some(line), Some(column)) => format!("{line}:{column}"),
                _ => hazard.operation.clone(),
            };
            println!(
                "{}: parameter '{}' may be null when dereferenced at {}",
                hazard.method,
                Color::Red.paint(&hazard.parameter),
                location
            );
        }
    }

    log::info!("");
    log::info!(
        "analyzed methods: {} / {}",
        nb_success,
        nb_success + nb_fails
    );
    log::info!("hazardous parameter usages: {}", hazards.len());

    last_res
}
