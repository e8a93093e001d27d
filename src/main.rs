use std::process::ExitCode;

fn main() -> ExitCode {
    modhost::app::startup::startup()
}
