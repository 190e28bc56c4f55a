use anyhow::Context;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::Write;
use tracing::info;

/// Serializes a value to JSON and uploads it to an S3 bucket with `application/json` content type.
pub async fn write_json_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    value: &impl Serialize,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(value)?;

    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(body.into())
        .content_type("application/json")
        .send()
        .await
        .with_context(|| format!("S3 PutObject failed for s3://{bucket}/{key}"))?;

    info!(bucket, key, "JSON uploaded to S3");
    Ok(())
}

/// Uploads a local file, gzip-compressing it first when `gzip` is set.
///
/// Returns the object key actually written (`.gz` is appended when compressed).
pub async fn upload_file_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    path: &str,
    gzip: bool,
) -> anyhow::Result<String> {
    let contents = std::fs::read(path).with_context(|| format!("reading {path}"))?;

    let (body, key) = if gzip {
        (gzip_bytes(&contents)?, format!("{key}.gz"))
    } else {
        (contents, key.to_string())
    };

    client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(body.into())
        .send()
        .await
        .with_context(|| format!("S3 PutObject failed for s3://{bucket}/{key}"))?;

    info!(bucket, key = %key, gzip, "File uploaded to S3");
    Ok(key)
}

fn gzip_bytes(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_gzip_bytes_round_trip() {
        let compressed = gzip_bytes(b"carpark,lots\n1,10\n").unwrap();

        let mut decoded = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "carpark,lots\n1,10\n");
    }
}
