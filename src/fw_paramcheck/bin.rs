use flowworks::prelude::FwResult;
use flowworks::{cli, fw_paramcheck};

fn main() -> FwResult<()> {
    let args = cli::paramcheck().get_matches();
    fw_paramcheck::run(&args)
}
