//! distpack - builds distribution packages for a checkout inside a container.
//!
//! Exit code 0 means every required package is in the release directory.

use distpack::cli;
use std::process;

#[tokio::main]
async fn main() {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(code) => process::exit(code),
    };

    // Initialize logging; RUST_LOG wins over -v
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    let exit_code = cli::run(args).await;
    process::exit(exit_code);
}
