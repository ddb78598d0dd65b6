use crate::input::{load_program, MethodFilter};
use crate::prelude::*;
use clap::ArgMatches;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;

pub fn run(args: &ArgMatches) -> FwResult<()> {
    init_logger(args);

    let program = load_program(args)?;
    let repo = Repo::new(&program)?;
    let filter = MethodFilter::from_args(args)?;

    let mut nb_success = 0;
    let mut nb_fails = 0;
    let mut last_res = Ok(());

    for method in filter.methods(&repo) {
        println!("[*] {method}");

        let cfg = match crate::analysis::control_flow_graph(method) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::error!("{method}: {err}");
                nb_fails += 1;
                last_res = Err(err.into());
                continue;
            }
        };
        if let Some(cfg_dir) = args.get_one::<String>("output") {
            write_cfg_file(cfg_dir, method.definer(), method.name(), &cfg)?;
        } else {
            for block in cfg.blocks() {
                print!("{block}");
                for (target, branch) in cfg.successors(block.id()) {
                    println!("    -> {target} ({branch})");
                }
            }
        }
        nb_success += 1;
    }

    log::info!("");
    log::info!(
        "control flow graphs built: {} / {}",
        nb_success,
        nb_success + nb_fails
    );

    last_res
}

fn write_cfg_file<P: AsRef<Path>>(
    base_dir: P,
    class_name: &TypeName,
    method_name: &str,
    cfg: &controlflow::Cfg,
) -> FwResult<()> {
    // prepare directory (base_dir/fully_qualified_class_name)
    let mut dir = base_dir.as_ref().to_path_buf();
    dir.push(class_name.as_str());
    create_dir_all(&dir)?;

    // write file, constructors names start with a dot
    dir.push(method_name.trim_start_matches('.'));
    dir.set_extension("dot");
    let mut file = File::create(&dir)?;
    file.write_all(cfg.to_dot().as_bytes())?;
    log::debug!("dot output written in {:?}", dir);

    Ok(())
}
