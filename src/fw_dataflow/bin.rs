use flowworks::prelude::FwResult;
use flowworks::{cli, fw_dataflow};

fn main() -> FwResult<()> {
    let args = cli::dataflow().get_matches();
    fw_dataflow::run(&args)
}
