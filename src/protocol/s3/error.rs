//! Mapping of AWS SDK errors onto [`StoreError`]

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::protocol::{ObjectLocation, StoreError};

/// Convert an SDK error raised while operating on `location`
pub(crate) fn from_sdk<E, R>(error: SdkError<E, R>, location: &ObjectLocation) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match &error {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            StoreError::Network(DisplayErrorContext(&error).to_string())
        }
        SdkError::ServiceError(context) => {
            let err = context.err();
            let code = err.code().unwrap_or("Unknown");
            let message = err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&error).to_string());
            from_code(code, message, location)
        }
        _ => StoreError::Other(DisplayErrorContext(&error).to_string()),
    }
}

fn from_code(code: &str, message: String, location: &ObjectLocation) -> StoreError {
    match code {
        "NoSuchKey" | "NotFound" => StoreError::NotFound {
            container: location.container().to_string(),
            key: location.path().to_string(),
        },
        "AccessDenied" | "Forbidden" => StoreError::AccessDenied(message),
        _ => StoreError::Service {
            code: code.to_string(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> ObjectLocation {
        ObjectLocation::new("s3", "bucket", "key")
    }

    #[test]
    fn test_not_found_codes() {
        let err = from_code("NoSuchKey", "missing".to_string(), &loc());
        assert!(matches!(err, StoreError::NotFound { ref container, .. } if container == "bucket"));
    }

    #[test]
    fn test_access_denied() {
        let err = from_code("AccessDenied", "nope".to_string(), &loc());
        assert!(matches!(err, StoreError::AccessDenied(_)));
    }

    #[test]
    fn test_checksum_rejection_kept_as_service_code() {
        let err = from_code("BadDigest", "crc mismatch".to_string(), &loc());
        assert!(err.is_checksum_rejection());

        let err = from_code("SlowDown", "reduce rate".to_string(), &loc());
        assert!(matches!(err, StoreError::Service { ref code, .. } if code == "SlowDown"));
    }
}
