use crate::LogRecord;

/// Encode a record as the broker message value.
///
/// Downstream consumers parse this string, so the layout is fixed:
/// `Level: {level}, Message: {message}` with no trailing separator.
pub fn encode(record: &LogRecord) -> String {
    format!("Level: {}, Message: {}", record.level(), record.message())
}
