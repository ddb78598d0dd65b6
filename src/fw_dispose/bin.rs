use flowworks::prelude::FwResult;
use flowworks::{cli, fw_dispose};

fn main() -> FwResult<()> {
    let args = cli::dispose().get_matches();
    fw_dispose::run(&args)
}
