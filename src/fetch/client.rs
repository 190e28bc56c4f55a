use async_trait::async_trait;
use reqwest::{Request, Response};

/// Anything that can send a prepared request. Auth wrappers implement this by
/// decorating an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
