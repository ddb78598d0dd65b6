#![no_main]

use fw_analysis::controlflow::Cfg;
use fw_analysis::repo::Repo;
use fw_model::Program;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(program) = Program::from_slice(data) else {
        return;
    };
    // a program accepted by the loader must yield a repository and
    // control flow graphs without panicking
    if let Ok(repo) = Repo::new(&program) {
        for method in repo.iter_methods() {
            let _ = Cfg::for_method(method);
        }
    }
});
