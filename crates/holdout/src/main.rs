use holdout::prelude::*;

#[tokio::main]
async fn main() -> Result<(), HoldoutError> {
    let config = ServerConfig::from_env()?;
    holdout::logging::init(&config.logging);

    let store = InMemoryStore::with_reference_data(config.load_reference_data()?);
    let server = HoldoutServer::<InMemoryStore, OpaqueTokenAuthenticator, holdout_protocol::JsonCodec>::builder()
        .config(config)
        .build(store, OpaqueTokenAuthenticator::new())
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
