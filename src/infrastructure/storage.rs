use crate::services::storage::S3StorageService;
use aws_sdk_s3::config::{Credentials, Region};
use std::env;
use std::sync::Arc;
use tracing::info;

/// Build the S3 client. Uses the default AWS credential and region chain;
/// `S3_ENDPOINT`, `S3_REGION`, `S3_ACCESS_KEY`/`S3_SECRET_KEY` and
/// `S3_FORCE_PATH_STYLE` override it for MinIO-style deployments.
pub async fn setup_storage() -> Arc<S3StorageService> {
    let mut loader = aws_config::from_env();

    if let Ok(region) = env::var("S3_REGION") {
        loader = loader.region(Region::new(region));
    }

    match env::var("S3_ENDPOINT") {
        Ok(endpoint_url) => {
            info!("☁️  S3 Storage: {}", endpoint_url);
            loader = loader.endpoint_url(endpoint_url);
        }
        Err(_) => info!("☁️  S3 Storage: default AWS endpoint"),
    }

    if let (Ok(access_key), Ok(secret_key)) = (env::var("S3_ACCESS_KEY"), env::var("S3_SECRET_KEY")) {
        loader = loader.credentials_provider(Credentials::new(
            access_key, secret_key, None, None, "static",
        ));
    }

    let aws_config = loader.load().await;

    let force_path_style = env::var("S3_FORCE_PATH_STYLE")
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false);

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(force_path_style)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);
    Arc::new(S3StorageService::new(s3_client))
}
