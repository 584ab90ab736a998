use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// TracingFactory 是否全局初始化完成
static IS_INIT: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Default)]
pub struct TracingFactory {
    options: TracingFactoryOptions,
}

#[derive(Debug, Clone)]
pub struct TracingFactoryOptions {
    debug: bool,

    level: Level,

    log_dir: Option<String>,
}

impl TracingFactory {
    pub fn init_log(debug: bool) -> Self {
        TracingFactory::init_log_with_options(TracingFactoryOptions::new(debug, None))
    }

    /// Install the global subscriber. Safe to call more than once; only the
    /// first call takes effect.
    pub fn init_log_with_options(opts: TracingFactoryOptions) -> Self {
        if !IS_INIT.swap(true, Ordering::SeqCst) {
            let format = fmt::format()
                .with_file(false)
                .with_line_number(false)
                .with_target(true)
                .with_thread_names(true)
                .compact();

            match opts.log_dir.as_deref() {
                None => {
                    let _ = tracing_subscriber::fmt()
                        .with_max_level(opts.level)
                        .event_format(format)
                        .try_init();
                }
                Some(dir) => {
                    // file 与 std 同时输出
                    let file_appender = rolling::daily(dir, "dategate.log");
                    let merge = file_appender.and(io::stdout);

                    let _ = tracing_subscriber::fmt()
                        .with_max_level(opts.level)
                        .event_format(format)
                        .with_writer(merge)
                        .with_ansi(false)
                        .try_init();
                }
            }
        }

        TracingFactory { options: opts }
    }

    pub fn get_log_dir(&self) -> &str {
        self.options.get_log_dir()
    }
}

impl Default for TracingFactoryOptions {
    fn default() -> Self {
        TracingFactoryOptions::new(false, None)
    }
}

impl TracingFactoryOptions {
    pub fn new(debug: bool, log_dir: Option<String>) -> Self {
        let level = if debug { Level::DEBUG } else { Level::INFO };

        TracingFactoryOptions {
            debug,
            level,
            log_dir,
        }
    }

    /// Explicit level wins over the debug flag.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn get_log_dir(&self) -> &str {
        match self.log_dir.as_ref() {
            None => "",
            Some(dir) => dir.as_str(),
        }
    }
}

#[cfg(test)]
mod test {
    use tracing::{debug, error, info, warn};

    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        TracingFactory::init_log(true);
        TracingFactory::init_log(true);
        assert!(IS_INIT.load(Ordering::SeqCst));

        debug!("TracingFactory test: {:?}", "test");
        info!("TracingFactory test: {:?}", "test");
        warn!("TracingFactory test: {:?}", "test");
        error!("TracingFactory test: {:?}", "test");
    }

    #[test]
    fn test_level_from_flags() {
        let opts = TracingFactoryOptions::new(false, None).with_level(Level::WARN);
        assert!(!opts.is_debug());
        assert_eq!(opts.get_log_dir(), "");
    }
}
