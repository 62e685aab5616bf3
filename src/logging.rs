use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

use crate::core::config::LoggingConfig;

/// Writes every log line to stderr and, when configured, appends it to a file.
#[derive(Clone)]
pub(crate) struct TeeMakeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl TeeMakeWriter {
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Arc::new(Mutex::new(file)))
            }
            None => None,
        };
        Ok(Self { file })
    }
}

impl<'a> MakeWriter<'a> for TeeMakeWriter {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            file: self.file.clone(),
        }
    }
}

pub(crate) struct TeeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(file) = &self.file
            && let Ok(mut f) = file.lock()
        {
            f.write_all(buf)?;
        }
        std::io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(file) = &self.file
            && let Ok(mut f) = file.lock()
        {
            f.flush()?;
        }
        std::io::stderr().flush()
    }
}

pub(crate) fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Installs the global subscriber. A second call is a no-op.
pub(crate) fn init(config: &LoggingConfig) -> Result<()> {
    let make_writer = TeeMakeWriter::new(config.file.as_deref())?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&config.level))
        .with_writer(make_writer)
        .with_ansi(config.file.is_none())
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn tee_writer_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("shiftgen.log");
        let make = TeeMakeWriter::new(Some(&path)).unwrap();
        let mut writer = make.make_writer();
        writer.write_all(b"first\n").unwrap();
        writer.write_all(b"second\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
