//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bsync-core
//! for a single bucket.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::date_time::Format;
use aws_smithy_types::timeout::TimeoutConfig;
use bsync_core::traits::ETAG_KEY;
use bsync_core::{Alias, Error, ObjectStore, Result};

/// S3 client bound to one bucket
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from an alias configuration
    pub async fn new(alias: &Alias, bucket: impl Into<String>) -> Result<Self> {
        let credentials = aws_credential_types::Credentials::new(
            alias.access_key.clone(),
            alias.secret_key.clone(),
            None, // session token
            None, // expiry
            "bsync-static-credentials",
        );

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(alias.connect_timeout_secs))
            .build();

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(alias.region.clone()))
            .endpoint_url(&alias.endpoint)
            .timeout_config(timeouts)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(uses_path_style(&alias.bucket_lookup))
            .build();

        tracing::debug!(
            alias = %alias.name,
            endpoint = %alias.endpoint,
            connect_timeout_secs = alias.connect_timeout_secs,
            "Created S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: bucket.into(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E: std::fmt::Display>(error: &SdkError<E, HttpResponse>) -> String {
        match error {
            SdkError::ServiceError(service_err) => {
                format!("Service error: {}", service_err.err())
            }
            SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {err:?}")
            }
            SdkError::TimeoutError(_) => "Request timeout".to_string(),
            SdkError::DispatchFailure(err) => {
                format!("Network dispatch error: {err:?}")
            }
            SdkError::ResponseError(err) => format!("Response error: {err:?}"),
            _ => error.to_string(),
        }
    }

    /// Map an SDK error onto the error kinds the CLI distinguishes
    fn map_sdk_error<E: std::fmt::Display>(
        &self,
        key: &str,
        error: &SdkError<E, HttpResponse>,
    ) -> Error {
        let status = error.raw_response().map(|r| r.status().as_u16());
        let message = Self::format_sdk_error(error);
        match status {
            Some(401 | 403) => Error::Auth(message),
            Some(404) => Error::NotFound(format!("{}/{key}", self.bucket)),
            _ => Error::Network(message),
        }
    }
}

fn uses_path_style(bucket_lookup: &str) -> bool {
    bucket_lookup == "path" || bucket_lookup == "auto"
}

/// Content-Disposition header naming the file's base name
fn content_disposition(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    Some(format!("attachment; filename=\"{}\"", name.replace('"', "\\\"")))
}

/// Sibling file a download is streamed into before being renamed
fn partial_path(local_path: &Path) -> PathBuf {
    let mut name = local_path.file_name().unwrap_or_default().to_os_string();
    name.push(".bsync-part");
    local_path.with_file_name(name)
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(&self, key: &str, local_path: &Path) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::General(format!("{}: {e}", local_path.display())))?;

        let content_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        let mut request = self
            .inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body);

        if let Some(disposition) = content_disposition(local_path) {
            request = request.content_disposition(disposition);
        }

        request
            .send()
            .await
            .map_err(|e| self.map_sdk_error(key, &e))?;

        tracing::debug!(bucket = %self.bucket, key, "Put object");
        Ok(())
    }

    async fn get_object(&self, key: &str, local_path: &Path) -> Result<u64> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.map_sdk_error(key, &e))?;

        let partial = partial_path(local_path);
        let mut file = tokio::fs::File::create(&partial).await?;
        let written = async {
            let mut body = std::pin::pin!(response.body.into_async_read());
            let written = tokio::io::copy(&mut body, &mut file).await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        let written = match written {
            Ok(n) => n,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    tracing::debug!(
                        path = %partial.display(),
                        error = %cleanup,
                        "Partial file not removed"
                    );
                }
                return Err(Error::Network(format!("{}/{key}: {e}", self.bucket)));
            }
        };

        tokio::fs::rename(&partial, local_path).await?;
        tracing::debug!(bucket = %self.bucket, key, bytes = written, "Got object");
        Ok(written)
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        match self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match self.map_sdk_error(key, &e) {
                Error::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn get_object_metadata(&self, key: &str) -> Result<HashMap<String, String>> {
        let response = self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.map_sdk_error(key, &e))?;

        let mut metadata = HashMap::new();

        if let Some(etag) = response.e_tag() {
            metadata.insert(ETAG_KEY.to_string(), etag.to_string());
        }

        if let Some(length) = response.content_length() {
            metadata.insert("Content-Length".to_string(), length.to_string());
        }

        if let Some(ct) = response.content_type() {
            metadata.insert("Content-Type".to_string(), ct.to_string());
        }

        if let Some(modified) = response.last_modified()
            && let Ok(formatted) = modified.fmt(Format::HttpDate)
        {
            metadata.insert("Last-Modified".to_string(), formatted);
        }

        // User metadata as sent in x-amz-meta-* headers
        if let Some(user) = response.metadata() {
            for (name, value) in user {
                metadata.insert(format!("X-Amz-Meta-{name}"), value.clone());
            }
        }

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_is_sibling() {
        assert_eq!(
            partial_path(Path::new("/tmp/out/report.pdf")),
            PathBuf::from("/tmp/out/report.pdf.bsync-part")
        );
    }

    #[test]
    fn test_bucket_lookup_style() {
        assert!(uses_path_style("auto"));
        assert!(uses_path_style("path"));
        assert!(!uses_path_style("dns"));
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition(Path::new("/tmp/报告.pdf")).as_deref(),
            Some("attachment; filename=\"报告.pdf\"")
        );
        assert_eq!(
            content_disposition(Path::new("a\"b.txt")).as_deref(),
            Some("attachment; filename=\"a\\\"b.txt\"")
        );
        assert_eq!(content_disposition(Path::new("/")), None);
    }

    #[tokio::test]
    async fn test_client_binds_bucket() {
        let alias = Alias::new("local", "http://127.0.0.1:9000", "key", "secret");
        let client = S3Client::new(&alias, "photos").await.unwrap();
        assert_eq!(client.bucket(), "photos");
    }
}
