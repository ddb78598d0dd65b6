use clap::ArgMatches;
use clap_complete::{generate, Shell};
use flowworks::prelude::*;
use flowworks::{cli, fw_cfg, fw_dataflow, fw_dispose, fw_paramcheck};
use std::io;

fn main() -> FwResult<()> {
    let args = cli::flowworks().get_matches();

    match &args.subcommand() {
        Some(("cfg", cmd_args)) => fw_cfg::run(cmd_args),
        Some(("dataflow", cmd_args)) => fw_dataflow::run(cmd_args),
        Some(("dispose", cmd_args)) => fw_dispose::run(cmd_args),
        Some(("paramcheck", cmd_args)) => fw_paramcheck::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(FwError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(FwError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> FwResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| FwError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::flowworks();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}
