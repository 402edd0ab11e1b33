use anyhow::{bail, Result};
use clap::Args;
use std::time::Duration;

use crate::waiter::{WaitPolicy, Waits};

/// Connection and wait settings for a migration run.
/// Every flag falls back to an environment variable (a `.env` file is loaded first).
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Region the instances currently live in
    #[arg(long, env = "SOURCE_REGION")]
    pub source_region: String,

    /// Region the instances are moved to
    #[arg(long, env = "DESTINATION_REGION")]
    pub destination_region: String,

    /// Control-plane provider (`ec2`, or `mock` for dry runs against MOCK_FIXTURE)
    #[arg(long, env = "PROVIDER", default_value = "ec2")]
    pub provider: String,

    #[arg(long, env = "WAIT_POLL_INTERVAL_SECS", default_value_t = 15)]
    pub poll_interval_secs: u64,

    #[arg(long, env = "STOP_TIMEOUT_SECS", default_value_t = 600)]
    pub stop_timeout_secs: u64,

    #[arg(long, env = "IMAGE_TIMEOUT_SECS", default_value_t = 1800)]
    pub image_timeout_secs: u64,

    #[arg(long, env = "COPY_TIMEOUT_SECS", default_value_t = 3600)]
    pub copy_timeout_secs: u64,

    #[arg(long, env = "LAUNCH_TIMEOUT_SECS", default_value_t = 900)]
    pub launch_timeout_secs: u64,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let src = self.source_region.trim();
        let dst = self.destination_region.trim();
        if src.is_empty() || dst.is_empty() {
            bail!("source and destination regions must both be set");
        }
        if src.eq_ignore_ascii_case(dst) {
            bail!("source and destination region are both '{}'", src);
        }
        for (name, secs) in [
            ("stop", self.stop_timeout_secs),
            ("image", self.image_timeout_secs),
            ("copy", self.copy_timeout_secs),
            ("launch", self.launch_timeout_secs),
        ] {
            if secs == 0 {
                bail!("{} timeout must be greater than zero", name);
            }
        }
        Ok(())
    }

    pub fn waits(&self) -> Waits {
        let interval = Duration::from_secs(self.poll_interval_secs);
        let policy = |secs: u64| WaitPolicy::new(interval, Duration::from_secs(secs));
        Waits {
            stop: policy(self.stop_timeout_secs),
            image: policy(self.image_timeout_secs),
            copy: policy(self.copy_timeout_secs),
            launch: policy(self.launch_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["relocate"];
        argv.extend_from_slice(args);
        Harness::try_parse_from(argv).unwrap().settings
    }

    #[test]
    fn defaults_match_the_documented_wait_policy() {
        let settings = parse(&[
            "--source-region",
            "us-east-1",
            "--destination-region",
            "eu-west-1",
            "--provider",
            "mock",
        ]);
        settings.validate().unwrap();
        assert_eq!(settings.waits(), Waits::default());
    }

    #[test]
    fn same_region_is_rejected() {
        let settings = parse(&[
            "--source-region",
            "us-east-1",
            "--destination-region",
            "US-EAST-1",
        ]);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("both 'us-east-1'"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let settings = parse(&[
            "--source-region",
            "us-east-1",
            "--destination-region",
            "eu-west-1",
            "--copy-timeout-secs",
            "0",
        ]);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn custom_waits() {
        let settings = parse(&[
            "--source-region",
            "us-east-1",
            "--destination-region",
            "eu-west-1",
            "--poll-interval-secs",
            "2",
            "--launch-timeout-secs",
            "60",
        ]);
        let waits = settings.waits();
        assert_eq!(waits.launch, WaitPolicy::new(Duration::from_secs(2), Duration::from_secs(60)));
        assert_eq!(waits.stop.interval, Duration::from_secs(2));
    }
}
