use crate::analysis::copy::CopyResult;
use crate::analysis::dataflow::Dataflow;
use crate::analysis::dispose::DisposeResult;
use crate::analysis::null::NullResult;
use crate::analysis::param_validation::ParameterValidationResult;
use crate::analysis::points_to::PointsToResult;
use crate::analysis::value_content::ValueContentResult;
use crate::input::{analysis_config, load_program, MethodFilter};
use crate::prelude::*;
use clap::ArgMatches;
use std::fmt;

pub fn run(args: &ArgMatches) -> FwResult<()> {
    init_logger(args);

    let program = load_program(args)?;
    let repo = Repo::new(&program)?;
    let filter = MethodFilter::from_args(args)?;
    let kind = args
        .get_one::<String>("kind")
        .ok_or_else(|| FwError::BadArguments("--kind needed".to_string()))?
        .parse::<AnalysisKind>()?;
    let session = AnalysisSession::new(&repo, analysis_config(args)?);
    log::info!("{kind} analysis");

    let mut nb_success = 0;
    let mut nb_fails = 0;
    let mut last_res = Ok(());

    for method in filter.methods(&repo) {
        println!("[*] {method}");
        let res = match kind {
            AnalysisKind::PointsTo => print_states(&session, method, PointsToResult::dataflow),
            AnalysisKind::Copy => print_states(&session, method, CopyResult::dataflow),
            AnalysisKind::ValueContent => {
                print_states(&session, method, ValueContentResult::dataflow)
            }
            AnalysisKind::Null => print_states(&session, method, NullResult::dataflow),
            AnalysisKind::Dispose => print_states(&session, method, DisposeResult::dataflow),
            AnalysisKind::ParameterValidation => {
                print_states(&session, method, ParameterValidationResult::dataflow)
            }
        };
        match res {
            Ok(()) => nb_success += 1,
            Err(err) => {
                log::error!("{method}: {err}");
                nb_fails += 1;
                last_res = Err(err);
            }
        }
    }

    log::info!("");
    log::info!(
        "analyzed methods: {} / {}",
        nb_success,
        nb_success + nb_fails
    );
    log::info!("{}", session.stats());

    last_res
}

fn print_states<'a, A, S>(
    session: &AnalysisSession<'a>,
    method: &'a Method<'a>,
    dataflow: fn(&A) -> &Dataflow<S>,
) -> FwResult<()>
where
    A: Analysis,
    S: fmt::Display,
{
    let cfg = session.cfg(method)?;
    let result = session.analyze::<A>(method)?;
    let dataflow = dataflow(&*result);
    for block in cfg.blocks() {
        let id = block.id();
        match (dataflow.entry_state(id), dataflow.exit_state(id)) {
            (Some(entry), Some(exit)) => {
                println!("  block {id}");
                println!("{}", indent("entry", entry));
                println!("{}", indent("exit", exit));
            }
            _ => println!("  block {id}: unreachable"),
        }
    }
    Ok(())
}

fn indent(title: &str, state: &impl fmt::Display) -> String {
    let mut res = format!("    {title}:");
    for line in state.to_string().lines() {
        res.push_str("\n      ");
        res.push_str(line);
    }
    res
}
