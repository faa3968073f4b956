use std::process::ExitCode;

use stride_mdp::cli::run_with_args;

fn main() -> ExitCode {
    match run_with_args() {
        Ok(infected) => {
            println!("{infected}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
