#[cfg(not(debug_assertions))]
use human_panic::setup_panic;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;

// Log lines go to stderr so stdout only carries presented results.
pub fn install_logger(level: Level) -> Result<(), SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

pub fn init_logging(verbose: bool) -> Result<(), SetGlobalDefaultError> {
    // Human Panic. Only enabled when *not* debugging.
    #[cfg(not(debug_assertions))]
    {
        setup_panic!();
    }

    // Better Panic. Only enabled *when* debugging.
    #[cfg(debug_assertions)]
    {
        better_panic::Settings::debug()
            .most_recent_first(false)
            .lineno_suffix(true)
            .verbosity(better_panic::Verbosity::Full)
            .install();
    }

    install_logger(if verbose { Level::DEBUG } else { Level::INFO })
}
