use clap::CommandFactory;

use super::Cli;

/// The full help text, shown after argument errors.
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

pub fn print_usage() {
    println!("{}", usage());
}

/// Print an error, followed by the usage text for argument errors.
pub fn report(e: &crate::Error) {
    eprintln!("forestdot: {e}");
    if e.wants_usage() {
        print_usage();
    }
}
