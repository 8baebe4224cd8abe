use std::process::ExitCode;

fn main() -> ExitCode {
    trial::cli::run()
}
