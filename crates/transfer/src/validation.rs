use crate::TransferError;

/// Validates a name that is embedded in a quoted part header parameter.
///
/// Rejects CR, LF and `"`, any of which would end the parameter or the
/// header line early.
pub fn validate_header_token(kind: &str, value: &str) -> Result<(), TransferError> {
    if value.contains(['\r', '\n', '"']) {
        return Err(TransferError::InvalidHeaderValue(format!(
            "{kind} contains a line break or quote: {value:?}"
        )));
    }
    Ok(())
}

/// Validates an unquoted header value (MIME type, boundary).
pub(crate) fn validate_header_value(kind: &str, value: &str) -> Result<(), TransferError> {
    if value.contains(['\r', '\n']) {
        return Err(TransferError::InvalidHeaderValue(format!(
            "{kind} contains a line break: {value:?}"
        )));
    }
    Ok(())
}
