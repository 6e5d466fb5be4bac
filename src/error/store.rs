use std::fmt;

use mongodb::bson::{Bson, Document};
use serde::Serialize;

/// Structured information extracted from a driver error.
///
/// Serialized to JSON when the error is displayed so that the console can
/// show code, name and namespace without string scraping on the client side.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<ErrorDetails>,
}

/// Namespace/index/key details of a failed write.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) key: Option<Document>,
}

/// Render a driver error as a `Store error:` line followed by compact JSON.
pub fn format_driver_error(
    f: &mut fmt::Formatter<'_>,
    error: &mongodb::error::Error,
) -> fmt::Result {
    let info = extract_error_info(error);
    let json_output = serde_json::to_string(&info).map_err(|_| fmt::Error)?;
    write!(f, "Store error: {json_output}")
}

/// Extract structured information from a driver error using its typed kinds.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::{ErrorKind, WriteFailure};

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        ErrorKind::Write(write_failure) => {
            info.error_type = Some("mongo.write_error".to_string());

            match write_failure {
                WriteFailure::WriteError(write_error) => {
                    info.code = Some(write_error.code);
                    info.message = Some(write_error.message.clone());
                    info.name = error_name(write_error.code);
                    info.details =
                        Some(extract_details(&write_error.details, &write_error.message));
                }
                WriteFailure::WriteConcernError(wc_error) => {
                    info.code = Some(wc_error.code);
                    info.message = Some(wc_error.message.clone());
                    info.name = error_name(wc_error.code);
                }
                _ => {}
            }
        }
        ErrorKind::Command(command_error) => {
            info.error_type = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
            info.name = error_name(command_error.code);
        }
        ErrorKind::InsertMany(insert_error) => {
            info.error_type = Some("mongo.insert_many_error".to_string());

            if let Some(first_error) = insert_error.write_errors.as_ref().and_then(|e| e.first()) {
                info.code = Some(first_error.code);
                info.message = Some(first_error.message.clone());
                info.name = error_name(first_error.code);
                info.details = Some(extract_details(&first_error.details, &first_error.message));
            } else if let Some(wc_error) = &insert_error.write_concern_error {
                info.code = Some(wc_error.code);
                info.message = Some(wc_error.message.clone());
                info.name = error_name(wc_error.code);
            }
        }
        ErrorKind::Authentication { message, .. } => {
            info.error_type = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::InvalidArgument { message, .. } => {
            info.error_type = Some("mongo.invalid_argument".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.error_type = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    if matches!(info.code, Some(11000 | 11001)) {
        info.message = Some("Duplicate key error".to_string());
    }

    info
}

/// Human-readable name for common server error codes.
fn error_name(code: i32) -> Option<String> {
    let name = match code {
        11000 | 11001 => "DuplicateKey",
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        50 => "MaxTimeMSExpired",
        121 => "DocumentValidationFailure",
        _ => return None,
    };

    Some(name.to_string())
}

/// Pull namespace, index and key out of a write error.
///
/// The details document is preferred; the message is scanned only for
/// fields the document did not carry.
fn extract_details(error_details: &Option<Document>, message: &str) -> ErrorDetails {
    let mut details = ErrorDetails::default();

    if let Some(doc) = error_details {
        details.collection = string_field(doc, &["namespace", "ns"]);
        details.index = string_field(doc, &["index", "indexName"]);
        details.key = ["keyPattern", "keyValue"]
            .iter()
            .find_map(|k| doc.get_document(k).ok().cloned());
    }

    if details.collection.is_none() {
        details.collection = word_after(message, "collection: ");
    }
    if details.index.is_none() {
        details.index = word_after(message, "index: ");
    }

    details
}

fn string_field(doc: &Document, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match doc.get(k) {
        Some(Bson::String(s)) => Some(s.clone()),
        _ => None,
    })
}

fn word_after(message: &str, marker: &str) -> Option<String> {
    let start = message.find(marker)? + marker.len();
    let after = &message[start..];
    let end = after.find(' ')?;
    Some(after[..end].to_string())
}
