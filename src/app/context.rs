use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{CourierError, Result};
use crate::checker::{CheckOptions, Checker};
use crate::config::{Config, Transport, MAILCHANNELS_API_KEY_ENV, SMTP_PASSWORD_ENV};
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::parallel::ParallelFetcher;
use crate::fetcher::Fetcher;
use crate::notify::{Dispatcher, Envelope, LogSender, MailChannelsSender, MailSender, SmtpSender};
use crate::store::sqlite::SqliteStore;

/// Owns the config and the store. The checker, with its HTTP clients and
/// mail transport, is only built by commands that run checks.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    dry_run: bool,
}

impl AppContext {
    pub fn new(config: Config, db_path: Option<PathBuf>, dry_run: bool) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Ok(Self {
            config,
            store,
            dry_run,
        })
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Ok(Self {
            config,
            store,
            dry_run: false,
        })
    }

    /// Build the checker over this context's store and feed list.
    pub fn checker(&self) -> Result<Arc<Checker>> {
        let config = &self.config;
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::with_options(
            config.check.timeout(),
            &config.check.user_agent,
        )?);
        let parallel_fetcher = ParallelFetcher::with_workers(fetcher, config.check.workers);

        let dispatcher = Dispatcher::new(
            Self::mail_sender(config)?,
            Envelope {
                from: config.mail.from.clone(),
                to: config.mail.to.clone(),
                subject: config.mail.subject.clone(),
            },
            config.mail.delivery,
        );

        let options = CheckOptions {
            dedup_scope: config.check.dedup_scope,
            on_corrupt_state: config.check.on_corrupt_state,
            dry_run: self.dry_run,
        };

        Ok(Arc::new(Checker::new(
            self.store.clone(),
            self.store.clone(),
            parallel_fetcher,
            dispatcher,
            options,
        )))
    }

    fn mail_sender(config: &Config) -> Result<Arc<dyn MailSender + Send + Sync>> {
        let sender: Arc<dyn MailSender + Send + Sync> = match config.mail.transport {
            Transport::Log => Arc::new(LogSender),
            Transport::Smtp => {
                let smtp = &config.mail.smtp;
                let credentials = match &smtp.username {
                    Some(user) => {
                        let pass = std::env::var(SMTP_PASSWORD_ENV).map_err(|_| {
                            CourierError::Config(format!(
                                "{} must be set when mail.smtp.username is configured",
                                SMTP_PASSWORD_ENV
                            ))
                        })?;
                        Some((user.clone(), pass))
                    }
                    None => None,
                };
                Arc::new(SmtpSender::new(
                    &smtp.host,
                    smtp.port,
                    credentials,
                    config.mail.timeout(),
                )?)
            }
            Transport::Mailchannels => Arc::new(MailChannelsSender::new(
                config.mail.mailchannels.endpoint.clone(),
                std::env::var(MAILCHANNELS_API_KEY_ENV).ok(),
                config.mail.timeout(),
            )?),
        };

        Ok(sender)
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CourierError::Config("Could not find data directory".into()))?;
        let courier_dir = data_dir.join("courier");
        std::fs::create_dir_all(&courier_dir)?;
        Ok(courier_dir.join("courier.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use crate::store::FeedList;

    #[test]
    fn test_feed_commands_do_not_need_mail_credentials() {
        let mut config = Config::default();
        config.mail.transport = Transport::Smtp;
        config.mail.to = vec!["reader@example.com".into()];
        config.mail.smtp.username = Some("courier".into());

        let ctx = AppContext::in_memory(config).unwrap();
        commands::add_feed(&ctx, "https://example.com/feed.xml", None).unwrap();
        commands::list_feeds(&ctx).unwrap();
        assert_eq!(ctx.store.feed_urls().unwrap().len(), 1);

        if std::env::var(SMTP_PASSWORD_ENV).is_err() {
            assert!(matches!(ctx.checker(), Err(CourierError::Config(_))));
        }
    }

    #[test]
    fn test_checker_carries_dry_run() {
        let ctx = AppContext {
            config: Config::default(),
            store: Arc::new(SqliteStore::in_memory().unwrap()),
            dry_run: true,
        };
        assert!(ctx.checker().unwrap().options().dry_run);
    }
}
