use logstream::app;
use logstream::error::LogstreamError;

#[tokio::main]
async fn main() -> Result<(), LogstreamError> {
    app::run().await
}
