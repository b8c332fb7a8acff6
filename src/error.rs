use std::path::Path;

use owo_colors::{OwoColorize, colors::css::MediumPurple};
use resext::resext;
use strip_ansi_escapes::strip_str;
use time::macros::format_description;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncWriteExt, Stdout, stdout},
    sync::{Mutex, OnceCell},
};

#[resext(
    delimiter = " -> ",
    source_prefix = "Cause: ",
    include_variant = true,
    alloc = true
)]
pub enum SweepError {
    IoError(std::io::Error),
    NetworkError(reqwest::Error),
    UrlParseError(url::ParseError),
    ScrapeError(scraper::error::SelectorErrorKind<'static>),
    JsonError(serde_json::Error),
    ConfigError(toml::de::Error),
    Custom(String),
}

enum Logger {
    Stdout(Mutex<Stdout>),
    File(Mutex<File>),
}

static LOGGER: OnceCell<Logger> = OnceCell::const_new();

/// Routes all subsequent log lines to `path`, or to stdout when `None`.
///
/// Only the first call has an effect; logging before initialization falls back to stdout.
pub async fn init_logger(path: Option<&Path>) {
    LOGGER.get_or_init(|| open_logger(path)).await;
}

async fn open_logger(path: Option<&Path>) -> Logger {
    let Some(path) = path else {
        return Logger::Stdout(Mutex::new(stdout()));
    };

    let res = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)
        .await;

    match res {
        Ok(file) => Logger::File(Mutex::new(file)),
        Err(err) => {
            println!(
                "{} Failed to open log file: {}\nCause: {}",
                "[WARN]".fg::<MediumPurple>(),
                path.to_string_lossy().red().bold(),
                err
            );

            Logger::Stdout(Mutex::new(stdout()))
        }
    }
}

async fn logger() -> &'static Logger {
    LOGGER.get_or_init(|| open_logger(None)).await
}

pub const LOG_TIMESTAMP_FORMAT: &[time::format_description::BorrowedFormatItem] = format_description!(
    "[year]-[month padding:zero]-[day padding:zero] [hour]:[minute]:[second].[subsecond digits:3]"
);

async fn emit(level: &'static str, message: String) -> Res<()> {
    let timestamp: String = time::OffsetDateTime::now_utc()
        .to_offset(time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC))
        .format(&LOG_TIMESTAMP_FORMAT)
        .map_err(|_| String::from("Format Failure"))
        .context("Failed to format timestamp for log")?;

    match logger().await {
        Logger::File(mutex_wtr) => {
            let mut wtr = mutex_wtr.lock().await;

            let log = format!("{} {}:\n{}\n\n", timestamp, level, strip_str(message));

            wtr.write_all(log.as_bytes())
                .await
                .with_context(format_args!("Failed to write log at: {}", timestamp))?;
        }

        Logger::Stdout(mutex_stdout) => {
            let mut stdout = mutex_stdout.lock().await;

            let log = format!(
                "{} {}:\n{}\n\n",
                timestamp.yellow(),
                level.fg::<MediumPurple>(),
                message
            );

            stdout
                .write_all(log.as_bytes())
                .await
                .with_context(format_args!("Failed to write log at: {}", timestamp))?;
        }
    }

    Ok(())
}

/// Logs the error side of a result and keeps going.
///
/// `Ok(None)` means the value was an error that has now been logged; an `Err` is only
/// returned when the logger itself fails.
#[allow(async_fn_in_trait)]
pub trait Log<T> {
    async fn log(self, level: &'static str) -> Res<Option<T>>;
}

impl<T> Log<T> for Res<T> {
    async fn log(self, level: &'static str) -> Res<Option<T>> {
        match self {
            Ok(ok) => Ok(Some(ok)),
            Err(err) => {
                emit(level, err.to_string()).await?;
                Ok(None)
            }
        }
    }
}

impl Log<()> for String {
    async fn log(self, level: &'static str) -> Res<Option<()>> {
        emit(level, self).await?;
        Ok(None)
    }
}

#[macro_export]
macro_rules! match_option {
    ($opt:expr) => {
        match $opt {
            Some(v) => v,
            None => continue,
        }
    };
}
