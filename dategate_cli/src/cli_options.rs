use std::env::current_dir;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "dategate")]
#[command(version)]
#[command(about = "Intelligent MySQL proxy for constrained backends")]
#[command(long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(short, long, help = "Path to loaded configuration file", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the log level from the configuration
    #[arg(
        short,
        long,
        help = "log level: [TRACE | DEBUG | INFO | WARN | ERROR]",
        value_name = "LEVEL"
    )]
    pub log_level: Option<String>,

    /// enable debug info
    #[arg(short, long, help = "enable debug mode", default_value_t = false)]
    pub debug: bool,
}

impl CliArgs {
    /// Explicit path if given, otherwise ./conf/dategate.toml when it
    /// exists. `None` means built-in defaults.
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }

        let mut pwd = current_dir().unwrap_or_else(|_| "/".into());
        pwd.push("conf");
        pwd.push("dategate");
        pwd.set_extension("toml");

        if pwd.exists() {
            Some(pwd)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_explicit_config_wins() {
        let args = CliArgs {
            config: Some(PathBuf::from("/etc/dategate.toml")),
            log_level: None,
            debug: false,
        };
        assert_eq!(args.config_path(), Some(PathBuf::from("/etc/dategate.toml")));
    }
}
