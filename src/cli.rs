use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::ArgAction;
use sedbot::{
    Bot, Config, EventSource, RunMode, Sed, Settings,
    source::{Backoff, CommentStream, RedditSource, reddit::Reddit},
};
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Whether replies are actually posted
    #[arg(long, value_enum, ignore_case = true, default_value = "dry-run")]
    run_mode: RunMode,

    /// The subreddit to watch, or 'all'
    #[arg(long, default_value = "all")]
    target_subreddit: String,

    /// Also act on comments written by the bot's own account
    #[arg(long)]
    allow_self_reply: bool,

    /// Path to the configuration file holding the account credentials
    #[arg(short, long, default_value = "sedbot.toml")]
    config: PathBuf,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        tracing::info!(
            mode = %self.run_mode,
            subreddit = %self.target_subreddit,
            "starting sedbot"
        );

        let config = Config::load(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;
        let sed = Self::sed(&config)?;

        let client = Reddit::new(config.reddit.clone())?;
        let stream = CommentStream::new(true)
            .with_backoff(Backoff::new(Duration::from_secs(1), config.max_backoff()));
        let mut source = RedditSource::new(client, self.target_subreddit, stream);

        let identity = source
            .identity()
            .context("failed to look up the bot's account")?;

        let settings = Settings {
            mode: self.run_mode,
            allow_self_reply: self.allow_self_reply,
        };
        Bot::new(sed, identity, settings).run(&mut source)?;

        Ok(())
    }

    #[instrument(level = "debug", skip_all)]
    fn sed(config: &Config) -> anyhow::Result<Sed> {
        let sed = match config.sed_path() {
            Some(path) => Sed::at(path)?,
            None => Sed::locate()?,
        };
        let sed = sed.with_timeout(config.sed_timeout());
        tracing::debug!(path = %sed.path().display(), timeout = ?sed.timeout(), "using sed");
        Ok(sed)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults_are_dry_run_on_all() {
        let cli = Cli::try_parse_from(["sedbot"]).unwrap();
        assert_eq!(cli.run_mode, RunMode::DryRun);
        assert_eq!(cli.target_subreddit, "all");
        assert!(!cli.allow_self_reply);
        assert_eq!(cli.config, PathBuf::from("sedbot.toml"));
    }

    #[test]
    fn run_mode_is_case_insensitive() {
        let cli = Cli::try_parse_from(["sedbot", "--run-mode", "Live"]).unwrap();
        assert_eq!(cli.run_mode, RunMode::Live);

        let cli = Cli::try_parse_from(["sedbot", "--run-mode", "DryRun"]).unwrap();
        assert_eq!(cli.run_mode, RunMode::DryRun);
    }

    #[test]
    fn all_options() {
        let cli = Cli::try_parse_from([
            "sedbot",
            "--run-mode",
            "live",
            "--target-subreddit",
            "rust",
            "--allow-self-reply",
            "--config",
            "/etc/sedbot.toml",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.target_subreddit, "rust");
        assert!(cli.allow_self_reply);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn unknown_run_mode_is_rejected() {
        assert!(Cli::try_parse_from(["sedbot", "--run-mode", "sometimes"]).is_err());
    }
}
