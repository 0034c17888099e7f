use std::process::ExitCode;

fn main() -> ExitCode {
    dialtone_cli::run()
}
