pub mod http_fetcher;
pub mod parallel;

use async_trait::async_trait;

use crate::app::Result;

/// Retrieves raw feed content. Implementations do not retry; a failure is
/// reported for this feed only and the run carries on with the others.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
