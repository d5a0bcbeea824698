//! Default value factories.

use chrono::Utc;
use uuid::Uuid;

use dynaorm_proto::Value;

/// Random UUID string.
pub fn uuid_v4() -> impl Fn() -> Value + Send + Sync + 'static {
    || Value::String(Uuid::new_v4().to_string())
}

/// `<prefix>-<milliseconds since epoch>`.
pub fn prefixed_timestamp(prefix: impl Into<String>) -> impl Fn() -> Value + Send + Sync + 'static {
    let prefix = prefix.into();
    move || Value::String(format!("{}-{}", prefix, Utc::now().timestamp_millis()))
}

/// The current instant.
pub fn now() -> impl Fn() -> Value + Send + Sync + 'static {
    || now_value()
}

/// The current instant as a timestamp value.
pub(crate) fn now_value() -> Value {
    Value::Timestamp(Utc::now().timestamp_micros())
}
