use std::process::ExitCode;

fn main() -> ExitCode {
    goldsmith_cli::run()
}
