use clap::Args;

use crate::config::{ConfigArgs, LoggingSettings};

/// Logging flags shared by every subcommand
#[derive(Debug, Clone, Default, Args)]
pub struct LoggingArgs {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", env = "LOCALDOCS_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log filter directives
    #[arg(long = "log-filter", env = "LOCALDOCS_LOG_FILTER")]
    pub log_filter: Option<String>,
}

impl LoggingArgs {
    /// Flags first, then the `[logging]` section
    pub fn effective_level<'a>(&'a self, settings: &'a LoggingSettings) -> &'a str {
        match (self.verbose, self.log_level.as_deref()) {
            (v, _) if v >= 2 => "trace",
            (1, _) => "debug",
            (0, Some(level)) => level,
            _ => settings.level.as_str(),
        }
    }

    pub fn effective_filter<'a>(&'a self, settings: &'a LoggingSettings) -> Option<&'a str> {
        self.log_filter.as_deref().or(settings.filter.as_deref())
    }
}

/// Print the effective configuration
#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_level_precedence() {
        let settings = LoggingSettings {
            level: "warn".into(),
            ..LoggingSettings::default()
        };

        let mut args = LoggingArgs::default();
        assert_eq!(args.effective_level(&settings), "warn");

        args.log_level = Some("error".into());
        assert_eq!(args.effective_level(&settings), "error");

        args.verbose = 1;
        assert_eq!(args.effective_level(&settings), "debug");

        args.verbose = 3;
        assert_eq!(args.effective_level(&settings), "trace");
    }

    #[test]
    fn test_filter_falls_back_to_settings() {
        let settings = LoggingSettings {
            filter: Some("localdocs_core=trace".into()),
            ..LoggingSettings::default()
        };
        let mut args = LoggingArgs::default();
        assert_eq!(args.effective_filter(&settings), Some("localdocs_core=trace"));

        args.log_filter = Some("reqwest=debug".into());
        assert_eq!(args.effective_filter(&settings), Some("reqwest=debug"));
    }
}
