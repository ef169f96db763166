use pipeboard::cli::{internal_error, run};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("PIPEBOARD_LOG", "warn"))
        .format_timestamp(None)
        .init();

    #[cfg(windows)]
    let _ = enable_ansi_support::enable_ansi_support();

    // User errors exit from inside the handlers; anything returned here is unexpected
    if let Err(e) = run() {
        internal_error(&format!("{:#}", e));
    }
}
