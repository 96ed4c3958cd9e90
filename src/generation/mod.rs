//! Generation backend boundary: a prompt in, an ordered stream of text
//! fragments out.
//!
//! A backend call is stateless: re-invoking `generate` with the same prompt
//! is safe, which keeps retry policy (if any caller wants one) out of this
//! layer. Cancellation is dropping the stream; implementations must release
//! their upstream connection when that happens, which `reqwest` body streams
//! do on drop.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::types::RagError;

pub use http::HttpGenerationBackend;
pub use mock::MockGenerationBackend;

/// Ordered fragments of one generation. An `Err` item is terminal: the
/// stream yields nothing after it.
pub type FragmentStream = BoxStream<'static, Result<String, RagError>>;

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Open a single generation request.
    ///
    /// Connect failures before the first fragment surface as `Err` here;
    /// mid-stream failures surface as an `Err` item inside the stream.
    async fn generate(&self, prompt: &str) -> Result<FragmentStream, RagError>;
}
