// Logging setup
//
// env_logger backend for the `log` facade. Validation-layer output arrives
// through the debug messenger under the `vulkan` target, so it lands in the
// same sinks as everything else.

use crate::config::Config;
use env_logger::{Builder, Env, Target};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};

/// Initialize logging with optional file output for validation errors
pub fn init_logging(config: &Config) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if config.debug.log_to_file {
        match open_log_file(&config.debug.log_file) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(Tee { file })));
            }
            Err(e) => {
                eprintln!("Could not open log file {}: {}", config.debug.log_file, e);
            }
        }
    }

    // A second init (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}

/// Create/clear the log file and write the session header.
fn open_log_file(path: &str) -> io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    writeln!(file, "=== Vulkan Log ===")?;
    writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;
    Ok(file)
}

/// Writes every record to stderr and the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}
