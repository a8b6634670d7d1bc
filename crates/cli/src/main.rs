use std::process::ExitCode;

fn main() -> ExitCode {
    billburn_cli::run()
}
