//! S3 (and S3-compatible) backend on top of `aws-sdk-s3`.

use super::{ListPage, ListRequest, ObjectStore, StoreError, StoreResult};
use crate::models::object::{ObjectRecord, StorageClass};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    types::{MetadataDirective, StorageClass as S3StorageClass},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::debug;

/// Connection settings for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: Option<String>,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: Option<String>,
}

impl S3Store {
    pub fn new(client: Client, bucket: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.filter(|b| !b.trim().is_empty()),
        }
    }

    /// Build a client from the default credential chain (environment, shared
    /// profile, instance metadata) and the given region/endpoint.
    pub async fn connect(settings: &S3Settings) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = settings.endpoint_url.as_deref() {
            builder = builder.endpoint_url(endpoint);
        }
        if settings.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()), settings.bucket.clone())
    }

    fn bucket(&self) -> StoreResult<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| StoreError::Misconfigured("S3 bucket name not configured".into()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        request: &ListRequest,
        continuation: Option<String>,
    ) -> StoreResult<ListPage> {
        let bucket = self.bucket()?;
        let mut call = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(&request.prefix)
            .max_keys(request.max_keys);
        if let Some(delimiter) = &request.delimiter {
            call = call.delimiter(delimiter);
        }
        if let Some(token) = continuation {
            call = call.continuation_token(token);
        }

        let response = call.send().await.map_err(classify)?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                Some(ObjectRecord {
                    key: obj.key()?.to_string(),
                    // S3 omits the class for some compatible stores; absent means STANDARD.
                    storage_class: obj
                        .storage_class()
                        .map(|class| class.as_str().to_string())
                        .unwrap_or_else(|| StorageClass::Standard.as_str().to_string()),
                    size: obj.size().unwrap_or(0),
                    last_modified: obj.last_modified().and_then(|dt| {
                        DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())
                    }),
                })
            })
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|prefix| prefix.prefix().map(str::to_string))
            .collect();

        let next_continuation = match (
            response.is_truncated().unwrap_or(false),
            response.next_continuation_token(),
        ) {
            (false, _) => None,
            (true, Some(token)) => Some(token.to_string()),
            (true, None) => {
                return Err(StoreError::Rejected {
                    code: "MissingContinuationToken".into(),
                    message: "truncated listing without a continuation token".into(),
                });
            }
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            next_continuation,
        })
    }

    async fn copy_in_place(&self, key: &str, storage_class: StorageClass) -> StoreResult<()> {
        let bucket = self.bucket()?;
        let copy_source = copy_source(bucket, key);
        debug!("copy {} -> {} as {}", copy_source, key, storage_class);

        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(copy_source)
            .key(key)
            .storage_class(S3StorageClass::from(storage_class.as_str()))
            .metadata_directive(MetadataDirective::Copy)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<()> {
        let bucket = self.bucket()?;
        let content_md5 = general_purpose::STANDARD.encode(md5::compute(&body).0);

        let mut call = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_md5(content_md5)
            .body(ByteStream::from(body));
        if let Some(content_type) = content_type {
            call = call.content_type(content_type);
        }

        call.send().await.map_err(classify)?;
        Ok(())
    }
}

/// `bucket/key` with each key segment percent-encoded; `/` separators stay.
fn copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<_> = key.split('/').map(urlencoding::encode).collect();
    format!("{}/{}", bucket, encoded.join("/"))
}

fn classify<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ConstructionFailure(_) => StoreError::Misconfigured(detail),
        SdkError::ServiceError(_) => {
            let code = err.code().unwrap_or("Unknown").to_string();
            let message = err.message().unwrap_or(detail.as_str()).to_string();
            classify_service_code(code, message)
        }
        // timeouts, dispatch and response failures
        _ => StoreError::Unreachable(detail),
    }
}

fn classify_service_code(code: String, message: String) -> StoreError {
    match code.as_str() {
        "NoSuchKey" | "NotFound" => StoreError::NotFound(message),
        "SlowDown" | "Throttling" | "ThrottlingException" | "RequestLimitExceeded"
        | "TooManyRequests" | "RequestThrottled" => StoreError::Throttled(message),
        "InternalError" | "ServiceUnavailable" | "RequestTimeout" | "OperationAborted" => {
            StoreError::Unreachable(format!("{code}: {message}"))
        }
        "NoSuchBucket" | "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
        | "PermanentRedirect" | "AuthorizationHeaderMalformed" | "InvalidBucketName" => {
            StoreError::Misconfigured(format!("{code}: {message}"))
        }
        _ => StoreError::Rejected { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        Client::from_conf(config)
    }

    #[test]
    fn copy_source_encodes_segments_but_keeps_separators() {
        assert_eq!(
            copy_source("album", "photos/summer trip/a+b.jpg"),
            "album/photos/summer%20trip/a%2Bb.jpg"
        );
    }

    #[test]
    fn service_codes_map_onto_store_errors() {
        let e = |code: &str| classify_service_code(code.into(), "m".into());
        assert_eq!(e("NoSuchKey"), StoreError::NotFound("m".into()));
        assert_eq!(e("SlowDown"), StoreError::Throttled("m".into()));
        assert!(e("InternalError").is_retryable());
        assert!(matches!(e("NoSuchBucket"), StoreError::Misconfigured(_)));
        assert_eq!(
            e("InvalidObjectState"),
            StoreError::Rejected {
                code: "InvalidObjectState".into(),
                message: "m".into()
            }
        );
    }

    #[tokio::test]
    async fn missing_bucket_fails_before_any_request() {
        let store = S3Store::new(offline_client(), Some("  ".into()));
        let err = store
            .list_page(&ListRequest::folders("photos/", 10), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Misconfigured(_)));

        let err = store
            .copy_in_place("photos/a.jpg", StorageClass::Glacier)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Misconfigured(_)));
    }
}
