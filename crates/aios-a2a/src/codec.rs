//! PartCodec: the one shared converter between internal parts and wire parts.
//!
//! - Text maps to a text part; the thought flag rides in `aios_thought`.
//! - Files map to a URI or a base64 bytes payload, matching the source.
//! - Structured kinds map to data parts typed by `aios_type`. Function calls
//!   also carry `aios_is_long_running`.
//!
//! Data parts without a recognized type decode to a text part holding the
//! canonical JSON of their payload. That direction is lossy on purpose.

use aios_protocol::{
    A2aError, A2aResult, CodeExecutionResult, DataPart, ExecutableCode, FileContent, FileData,
    FilePart, FileSource, FunctionCall, FunctionResponse, Metadata, Part, TextPart, WirePart,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexSet;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

pub const THOUGHT_KEY: &str = "aios_thought";
pub const DATA_TYPE_KEY: &str = "aios_type";
pub const LONG_RUNNING_KEY: &str = "aios_is_long_running";

pub const DATA_TYPE_FUNCTION_CALL: &str = "function_call";
pub const DATA_TYPE_FUNCTION_RESPONSE: &str = "function_response";
pub const DATA_TYPE_CODE_EXECUTION_RESULT: &str = "code_execution_result";
pub const DATA_TYPE_EXECUTABLE_CODE: &str = "executable_code";

/// Output of [`decode`]: the internal parts plus the IDs of function calls
/// the peer flagged as long-running, in first-seen order without repeats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedParts {
    pub parts: Vec<Part>,
    pub long_running_ids: Vec<String>,
}

/// Encode internal parts. A function call is long-running when its ID is in
/// `long_running_ids`.
pub fn encode(parts: &[Part], long_running_ids: &[String]) -> A2aResult<Vec<WirePart>> {
    parts
        .iter()
        .map(|part| encode_part(part, long_running_ids))
        .collect()
}

fn encode_part(part: &Part, long_running_ids: &[String]) -> A2aResult<WirePart> {
    let wire = match part {
        Part::Text { text, thought } => {
            let mut metadata = Metadata::new();
            if *thought {
                metadata.insert(THOUGHT_KEY.into(), Value::Bool(true));
            }
            WirePart::Text(TextPart {
                text: text.clone(),
                metadata,
            })
        }
        Part::File(file) => WirePart::File(FilePart {
            file: encode_file(file),
            metadata: Metadata::new(),
        }),
        Part::FunctionCall(call) => {
            let mut part = data_part(call, DATA_TYPE_FUNCTION_CALL)?;
            part.metadata.insert(
                LONG_RUNNING_KEY.into(),
                Value::Bool(long_running_ids.contains(&call.id)),
            );
            WirePart::Data(part)
        }
        Part::FunctionResponse(response) => {
            WirePart::Data(data_part(response, DATA_TYPE_FUNCTION_RESPONSE)?)
        }
        Part::ExecutableCode(code) => WirePart::Data(data_part(code, DATA_TYPE_EXECUTABLE_CODE)?),
        Part::CodeExecutionResult(result) => {
            WirePart::Data(data_part(result, DATA_TYPE_CODE_EXECUTION_RESULT)?)
        }
    };
    Ok(wire)
}

fn encode_file(file: &FileData) -> FileContent {
    match &file.source {
        FileSource::Uri(uri) => FileContent::Uri {
            uri: uri.clone(),
            mime_type: file.mime_type.clone(),
            name: file.name.clone(),
        },
        FileSource::Inline(bytes) => FileContent::Bytes {
            bytes: STANDARD.encode(bytes),
            mime_type: file.mime_type.clone(),
            name: file.name.clone(),
        },
    }
}

fn data_part<T: Serialize>(value: &T, data_type: &str) -> A2aResult<DataPart> {
    let data = match serde_json::to_value(value)? {
        Value::Object(map) => map,
        other => {
            return Err(A2aError::Codec(format!(
                "{data_type} payload is not an object: {other}"
            )));
        }
    };
    let mut metadata = Metadata::new();
    metadata.insert(DATA_TYPE_KEY.into(), Value::String(data_type.to_owned()));
    Ok(DataPart { data, metadata })
}

/// Decode wire parts into internal parts, collecting long-running call IDs.
pub fn decode(parts: &[WirePart]) -> A2aResult<DecodedParts> {
    let mut decoded = Vec::with_capacity(parts.len());
    let mut long_running = IndexSet::new();
    for wire in parts {
        let part = decode_part(wire)?;
        if is_flagged_long_running(wire) {
            match part.as_function_call() {
                Some(call) => {
                    long_running.insert(call.id.clone());
                }
                None => warn!("long-running flag on a data part that is not a function call"),
            }
        }
        decoded.push(part);
    }
    Ok(DecodedParts {
        parts: decoded,
        long_running_ids: long_running.into_iter().collect(),
    })
}

fn is_flagged_long_running(part: &WirePart) -> bool {
    matches!(part, WirePart::Data(data) if data.metadata.get(LONG_RUNNING_KEY) == Some(&Value::Bool(true)))
}

fn decode_part(part: &WirePart) -> A2aResult<Part> {
    match part {
        WirePart::Text(text) => Ok(Part::Text {
            text: text.text.clone(),
            thought: text
                .metadata
                .get(THOUGHT_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        WirePart::File(file) => decode_file(&file.file).map(Part::File),
        WirePart::Data(data) => decode_data(data),
    }
}

fn decode_file(file: &FileContent) -> A2aResult<FileData> {
    match file {
        FileContent::Uri {
            uri,
            mime_type,
            name,
        } => Ok(FileData {
            source: FileSource::Uri(uri.clone()),
            mime_type: mime_type.clone(),
            name: name.clone(),
        }),
        FileContent::Bytes {
            bytes,
            mime_type,
            name,
        } => {
            let bytes = STANDARD
                .decode(bytes)
                .map_err(|e| A2aError::Codec(format!("invalid base64 file bytes: {e}")))?;
            Ok(FileData {
                source: FileSource::Inline(bytes),
                mime_type: mime_type.clone(),
                name: name.clone(),
            })
        }
    }
}

fn decode_data(part: &DataPart) -> A2aResult<Part> {
    let data_type = part.metadata.get(DATA_TYPE_KEY).and_then(Value::as_str);
    let part = match data_type {
        Some(DATA_TYPE_FUNCTION_CALL) => Part::FunctionCall(typed::<FunctionCall>(&part.data)?),
        Some(DATA_TYPE_FUNCTION_RESPONSE) => {
            Part::FunctionResponse(typed::<FunctionResponse>(&part.data)?)
        }
        Some(DATA_TYPE_EXECUTABLE_CODE) => {
            Part::ExecutableCode(typed::<ExecutableCode>(&part.data)?)
        }
        Some(DATA_TYPE_CODE_EXECUTION_RESULT) => {
            Part::CodeExecutionResult(typed::<CodeExecutionResult>(&part.data)?)
        }
        _ => Part::text(canonical_json(&part.data)?),
    };
    Ok(part)
}

fn typed<T: DeserializeOwned>(data: &Map<String, Value>) -> A2aResult<T> {
    Ok(serde_json::from_value(Value::Object(data.clone()))?)
}

/// Compact JSON with keys in sorted order.
pub fn canonical_json(data: &Map<String, Value>) -> A2aResult<String> {
    Ok(serde_json::to_string(data)?)
}
