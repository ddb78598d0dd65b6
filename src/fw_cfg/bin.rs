use flowworks::prelude::FwResult;
use flowworks::{cli, fw_cfg};

fn main() -> FwResult<()> {
    let args = cli::cfg().get_matches();
    fw_cfg::run(&args)
}
