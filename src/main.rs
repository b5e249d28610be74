use std::process::ExitCode;

use clap::Parser;

use dar::rebase_cmd::{self, RebaseArgs};

/// Automatically rebase conflicting Django migrations on top of each other
///
/// When two branches each add a migration to the same app, Django sees two
/// leaf nodes and refuses to migrate. dar renumbers the migrations of one
/// branch and points them at the other branch's last migration, leaving a
/// single linear history.
///
/// EXAMPLE:
///
///   # testapp has 0002_alter_reporter_full_name and 0002_reporter_handle
///   dar testapp 0002_reporter_handle
///   # -> testapp/migrations/0003_reporter_handle.py, depending on
///   #    ("testapp", "0002_alter_reporter_full_name")
#[derive(Parser)]
#[command(name = "dar")]
#[command(version, about)]
struct Cli {
    #[command(flatten)]
    args: RebaseArgs,
}

fn main() -> ExitCode {
    dar::telemetry::init();
    let cli = Cli::parse();

    let stdout = std::io::stdout();
    match rebase_cmd::run(&cli.args, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
