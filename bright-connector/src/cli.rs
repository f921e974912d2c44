use crate::logging::LogFormat;
use clap::Parser;
use std::path::PathBuf;

/// One year, the longest accepted task interval
pub const MAX_INTERVAL_MINUTES: u64 = 525_600;

/// Forward Bright Cluster Manager monitoring data to Application Insights
#[derive(Debug, Parser)]
#[command(name = "bright-connector", version, about)]
pub struct Cli {
    /// Emit interval period in minutes
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_MINUTES))]
    pub emit_interval: u64,

    /// Refresh interval period in minutes
    #[arg(long, default_value_t = 1440, value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_MINUTES))]
    pub refresh_interval: u64,

    /// Directory holding appconfig.json, metricsconfig.ini and certs/
    #[arg(long, env = "BRIGHT_CONNECTOR_HOME")]
    pub workdir: Option<PathBuf>,

    /// Append the trace log to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn workdir(&self) -> std::io::Result<PathBuf> {
        match &self.workdir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["bright-connector"]).unwrap();
        assert_eq!(cli.emit_interval, 5);
        assert_eq!(cli.refresh_interval, 1440);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn test_intervals_and_format() {
        let cli = Cli::try_parse_from([
            "bright-connector",
            "--emit-interval",
            "2",
            "--refresh-interval",
            "60",
            "--log-format",
            "json",
            "--workdir",
            "/opt/connector",
        ])
        .unwrap();
        assert_eq!(cli.emit_interval, 2);
        assert_eq!(cli.refresh_interval, 60);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.workdir().unwrap(), PathBuf::from("/opt/connector"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Cli::try_parse_from(["bright-connector", "--emit-interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["bright-connector", "--refresh-interval", "0"]).is_err());
    }

    #[test]
    fn test_interval_upper_bound() {
        let max = MAX_INTERVAL_MINUTES.to_string();
        let over = (MAX_INTERVAL_MINUTES + 1).to_string();

        let cli = Cli::try_parse_from(["bright-connector", "--emit-interval", max.as_str()]).unwrap();
        assert_eq!(cli.emit_interval, MAX_INTERVAL_MINUTES);
        assert!(Cli::try_parse_from(["bright-connector", "--emit-interval", over.as_str()]).is_err());
        assert!(Cli::try_parse_from(["bright-connector", "--refresh-interval", over.as_str()]).is_err());
        assert!(
            Cli::try_parse_from(["bright-connector", "--emit-interval", "400000000000000000"]).is_err()
        );
    }
}
