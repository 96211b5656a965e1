use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::app::{CourierError, Result};
use crate::fetcher::Fetcher;
use crate::parser::{FeedParser, ParsedFeed};

pub const DEFAULT_WORKERS: usize = 10;

/// Fetches and parses many feeds at once, bounded by a semaphore.
///
/// Results come back in the order the URLs were given, so the caller can
/// evaluate them sequentially in feed-list order.
pub struct ParallelFetcher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    semaphore: Arc<Semaphore>,
}

impl ParallelFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher + Send + Sync>, workers: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub async fn fetch_all(
        &self,
        urls: Vec<String>,
        parser: &FeedParser,
    ) -> Vec<(String, Result<ParsedFeed>)> {
        let mut handles = Vec::new();

        for url in urls {
            let fetcher = self.fetcher.clone();
            let semaphore = self.semaphore.clone();
            let parser = parser.clone();
            let task_url = url.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| CourierError::Other(e.to_string()))?;

                fetch_single_feed(&fetcher, &task_url, &parser).await
            });

            handles.push((url, handle));
        }

        let mut results = Vec::new();
        for (url, handle) in handles {
            match handle.await {
                Ok(result) => results.push((url, result)),
                Err(e) => {
                    tracing::error!("Task join error for {}: {}", url, e);
                    results.push((url, Err(CourierError::Other(format!("task failed: {}", e)))));
                }
            }
        }

        results
    }
}

async fn fetch_single_feed(
    fetcher: &Arc<dyn Fetcher + Send + Sync>,
    url: &str,
    parser: &FeedParser,
) -> Result<ParsedFeed> {
    let body = fetcher.fetch(url).await?;
    let feed = parser.parse(&body)?;
    tracing::debug!("Parsed {} entries from {}", feed.entries.len(), url);
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapFetcher {
        bodies: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .get(url)
                .map(|b| b.clone().into_bytes())
                .ok_or_else(|| CourierError::Fetch {
                    url: url.to_string(),
                    reason: "HTTP status 404 Not Found".into(),
                })
        }
    }

    fn rss(title: &str) -> String {
        format!(
            r#"<rss version="2.0"><channel><title>{}</title>
            <item><title>One</title><guid>{}-1</guid></item></channel></rss>"#,
            title, title
        )
    }

    #[tokio::test]
    async fn test_results_keep_input_order_and_isolate_failures() {
        let mut bodies = HashMap::new();
        bodies.insert("https://a/feed".to_string(), rss("A"));
        bodies.insert("https://c/feed".to_string(), rss("C"));
        bodies.insert("https://bad/feed".to_string(), "<html>nope".to_string());

        let fetcher = Arc::new(MapFetcher {
            bodies,
            calls: AtomicUsize::new(0),
        });
        let parallel = ParallelFetcher::with_workers(fetcher.clone(), 2);

        let urls = vec![
            "https://a/feed".to_string(),
            "https://missing/feed".to_string(),
            "https://bad/feed".to_string(),
            "https://c/feed".to_string(),
        ];
        let results = parallel.fetch_all(urls, &FeedParser::new()).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].0, "https://a/feed");
        assert_eq!(results[0].1.as_ref().unwrap().title, "A");
        assert!(matches!(results[1].1, Err(CourierError::Fetch { .. })));
        assert!(matches!(results[2].1, Err(CourierError::FeedParse(_))));
        assert_eq!(results[3].1.as_ref().unwrap().title, "C");
    }

    #[tokio::test]
    async fn test_zero_workers_still_makes_progress() {
        let mut bodies = HashMap::new();
        bodies.insert("https://a/feed".to_string(), rss("A"));
        let fetcher = Arc::new(MapFetcher {
            bodies,
            calls: AtomicUsize::new(0),
        });

        let parallel = ParallelFetcher::with_workers(fetcher, 0);
        let results = parallel
            .fetch_all(vec!["https://a/feed".to_string()], &FeedParser::new())
            .await;
        assert!(results[0].1.is_ok());
    }
}
