use std::process;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use txxt_lists::{
    SaveFileError, Session, SessionError, Settings, SettingsError, SystemClock, TaskFile,
};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("bad log_level: {0}")]
    Logging(String),
    #[error("cannot load tasks: {0}")]
    Load(#[from] SaveFileError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("{e}");
            eprintln!("txxt-lists: {e}");
            1
        }
    };
    // Stdin is read on a blocking thread the runtime would otherwise wait on.
    process::exit(code);
}

async fn run() -> Result<(), AppError> {
    let settings = Settings::load()?;
    init_logging(&settings.log_level)?;

    // ── Load the board ─────────────────────────────────────────
    // A malformed file stops us here, before anything can overwrite it.
    let clock = SystemClock;
    let file = TaskFile::new(&settings.tasks_file);
    let board = file.load_board(&settings.categories, &clock)?;

    info!(
        path = %file.path().display(),
        tasks = board.len(),
        categories = board.categories().count(),
        "board loaded"
    );

    // ── Run until quit / EOF / Ctrl-C ──────────────────────────
    let mut session = Session::new(board, file, clock, settings.tick_interval());
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    session.run(stdin, &mut stdout, shutdown).await?;
    info!("bye");
    Ok(())
}

fn init_logging(level: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(level).map_err(|e| AppError::Logging(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
