//! Built-in model provider.

use async_trait::async_trait;
use relay_protocol::{CompletionRequest, ModelProviderPort, RelayResult};
use tracing::debug;

/// Placeholder capability used until a real model integration is wired in.
/// Echoes the prompt back as a canned response.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubModelProvider;

#[async_trait]
impl ModelProviderPort for StubModelProvider {
    async fn complete(&self, request: CompletionRequest) -> RelayResult<String> {
        debug!(model = ?request.model, "stub completion");
        Ok(format!("This is a response to: {}", request.prompt))
    }
}
