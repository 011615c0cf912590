//! Response generator trait

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::generation::{GenerationRequest, GenerationResponse, StreamChunk};
use crate::Result;

/// Boxed stream of incremental generator output
pub type GeneratorStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>>;

/// Turns a query plus context into a natural-language answer
///
/// # Example
///
/// ```ignore
/// let generator: Arc<dyn Generator> = Arc::new(MyLlmGenerator::new(config));
/// let response = generator.generate(request).await?;
/// println!("{} ({:.2})", response.answer, response.confidence);
/// ```
#[async_trait]
pub trait Generator: Send + Sync + 'static {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;

    /// Stream the answer incrementally; the last item has `done == true`
    fn generate_stream<'a>(&'a self, request: GenerationRequest) -> GeneratorStream<'a>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}
