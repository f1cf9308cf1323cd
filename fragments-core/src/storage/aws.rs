/*!
Shared plumbing for the AWS-backed stores: SDK configuration loading, error
classification and the retried call wrapper.
*/

use crate::observability;
use crate::{FragmentError, Result};
use aws_config::retry::RetryConfig as SdkRetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_smithy_runtime_api::client::result::SdkError;
use fragments_retry::{with_retry, RetryPolicy};
use std::future::Future;
use std::time::Instant;

/// Load an SDK configuration from the standard credential chain
///
/// `region` and `endpoint_url` override the environment when given; an
/// endpoint override points both clients at LocalStack or DynamoDB Local.
/// The SDK's own retry layer is disabled; [`call`] owns the retry policy.
pub async fn load_sdk_config(region: Option<&str>, endpoint_url: Option<&str>) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).retry_config(SdkRetryConfig::disabled());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    if let Some(endpoint) = endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}

/// Connectivity-level failures: the request never completed
pub(crate) fn is_transient<E, R>(error: &SdkError<E, R>) -> bool {
    match error {
        SdkError::DispatchFailure(failure) => {
            failure.is_io() || failure.is_timeout() || failure.is_other()
        }
        SdkError::TimeoutError(_) | SdkError::ResponseError(_) => true,
        _ => false,
    }
}

/// Flatten an SDK error into a message without leaking its type
pub(crate) fn describe<E, R>(operation: &str, error: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match error {
        SdkError::ServiceError(service) => {
            let err = service.err();
            format!(
                "{operation} failed ({}): {}",
                err.code().unwrap_or("Unknown"),
                err.message().unwrap_or("no message")
            )
        }
        other => format!("{operation} failed: {}", DisplayErrorContext(other)),
    }
}

/// Map an SDK error to `Transient` or to the store's permanent variant
pub(crate) fn map_sdk_error<E, R>(
    operation: &str,
    error: SdkError<E, R>,
    permanent: fn(String) -> FragmentError,
) -> FragmentError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = describe(operation, &error);
    if is_transient(&error) {
        FragmentError::Transient(message)
    } else {
        permanent(message)
    }
}

/// Run one store operation under the retry policy, recording metrics
pub(crate) async fn call<F, Fut, T>(
    store: &'static str,
    operation: &'static str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = with_retry(operation, policy, |attempt| {
        if attempt > 1 {
            observability::record_store_retry(store, operation);
        }
        f()
    })
    .await
    .map_err(FragmentError::from_retry);

    observability::record_store_call(store, operation, started.elapsed(), result.is_ok());
    result
}
