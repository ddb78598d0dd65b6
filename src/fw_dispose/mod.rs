use crate::analysis::dispose::{DisposeResult, DisposeValue, FieldDisposeLedger};
use crate::input::{analysis_config, load_program, MethodFilter};
use crate::prelude::*;
use clap::ArgMatches;
use nu_ansi_term::Color;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Leak {
    method: String,
    class: String,
    operation: String,
    line: Option<u32>,
    maybe_disposed: bool,
}

#[derive(Debug, Default, Serialize)]
struct Report {
    leaks: Vec<Leak>,
    undisposed_fields: Vec<String>,
}

pub fn run(args: &ArgMatches) -> FwResult<()> {
    init_logger(args);

    let program = load_program(args)?;
    let repo = Repo::new(&program)?;
    let filter = MethodFilter::from_args(args)?;
    let session = AnalysisSession::new(&repo, analysis_config(args)?);
    let ledger = FieldDisposeLedger::new();

    let methods = filter.methods(&repo);
    log::info!("dispose analysis of {} methods", methods.len());
    let results: Vec<_> = methods
        .par_iter()
        .map(|&method| {
            let res = session.analyze::<DisposeResult>(method);
            match &res {
                Ok(result) => ledger.record(result),
                Err(err) => log::error!("{method}: {err}"),
            }
            (method, res)
        })
        .collect();

    let mut nb_success = 0;
    let mut nb_fails = 0;
    let mut last_res = Ok(());
    let mut report = Report::default();
    for (method, res) in results {
        match res {
            Ok(result) => {
                nb_success += 1;
                report
                    .leaks
                    .extend(result.leaked_objects().into_iter().map(|leak| Leak {
                        method: method.to_string(),
                        class: leak.class.to_string(),
                        operation: leak.operation.to_string(),
                        line: leak.span.map(|span| span.line),
                        maybe_disposed: leak.state == DisposeValue::MaybeDisposed,
                    }));
            }
            Err(err) => {
                nb_fails += 1;
                last_res = Err(err.into());
            }
        }
    }
    report.undisposed_fields = ledger
        .undisposed_fields()
        .iter()
        .map(ToString::to_string)
        .collect();

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
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

fn print_report(report: &Report) {
    for leak in &report.leaks {
        let location = leak
            .line
            .map_or_else(|| leak.operation.clone(), |line| format!("line {line}"));
        let message = format!(
            "{}: {} created at {} is {}disposed",
            leak.method,
            leak.class,
            location,
            if leak.maybe_disposed { "not always " } else { "never " }
        );
        if leak.maybe_disposed {
            println!("{}", Color::Yellow.paint(message));
        } else {
            println!("{}", Color::Red.paint(message));
        }
    }
    for field in &report.undisposed_fields {
        println!(
            "{}",
            Color::Red.paint(format!("{field} owns a disposable object that is never disposed"))
        );
    }
    if report.leaks.is_empty() && report.undisposed_fields.is_empty() {
        println!("{}", Color::Green.paint("no dispose issue found"));
    }
}
