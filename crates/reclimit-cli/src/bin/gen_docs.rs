//! Binary that emits command-line options markdown to stdout.
//!
//! Redirect the output to refresh the command-line options page.

fn main() {
    print!("{}", reclimit_cli::render_options_markdown());
}
