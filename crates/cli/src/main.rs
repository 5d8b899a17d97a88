use std::process::ExitCode;

fn main() -> ExitCode {
    votingbot_cli::run()
}
