use anyhow::{Context, Result, bail};
use local_blob_store::{
    Body, LocalStorage,
    config::{Command, StoreConfig},
};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup (stderr keeps object bytes on stdout clean) ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = StoreConfig::from_env_and_args()?;
    tracing::debug!("Using config: {:?}", cfg);

    let storage = LocalStorage::new(cfg.root, cfg.endpoint);

    match command {
        Command::Put { bucket, key, file } => {
            let source = File::open(&file)
                .await
                .with_context(|| format!("opening {}", file.display()))?;
            let body = Body::from_file(source).await?;
            let mut object = storage.bucket(&bucket).new_object(&key).with_body(body);
            object.save().await?;
            tracing::info!(
                "Stored {} bytes at {}/{}",
                object.content_length().unwrap_or_default(),
                bucket,
                key
            );
        }
        Command::Get { bucket, key } => {
            let Some(mut object) = storage.bucket(&bucket).get(&key).await? else {
                bail!("object `{}` not found in bucket `{}`", key, bucket);
            };
            let bytes = object.body().await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&bytes).await?;
            stdout.flush().await?;
        }
        Command::Head { bucket, key } => {
            let Some(object) = storage.bucket(&bucket).head(&key).await? else {
                bail!("object `{}` not found in bucket `{}`", key, bucket);
            };
            println!("{}", serde_json::to_string_pretty(&object.attributes())?);
        }
        Command::Rm { bucket, key } => {
            storage.bucket(bucket).new_object(key).destroy().await?;
        }
        Command::Cp {
            bucket,
            key,
            dst_bucket,
            dst_key,
        } => {
            let copied = storage
                .bucket(bucket)
                .new_object(key)
                .copy(&dst_bucket, &dst_key)
                .await?;
            tracing::info!(
                "Copied {} bytes to {}/{}",
                copied.content_length().unwrap_or_default(),
                dst_bucket,
                dst_key
            );
        }
        Command::Url { bucket, key } => {
            match storage.bucket(bucket).new_object(key).public_url()? {
                Some(url) => println!("{}", url),
                None => bail!("no endpoint configured (set --endpoint or LOCAL_BLOB_ENDPOINT)"),
            }
        }
    }

    Ok(())
}
