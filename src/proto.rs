//! Protocol Buffer messages of the streaming upload protocol.
//!
//! ```proto
//! message UploadRequest { string filename = 1; bytes content = 2; }
//! message EndOfStream {}
//! message UploadFrame { oneof payload { UploadRequest chunk = 1; EndOfStream end = 2; } }
//! message UploadStatus { string message = 1; bool success = 2; string video_id = 3; Code code = 4; }
//! ```

use bytes::Bytes;

use crate::error::SessionError;

/// Recommended size of one `content` chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// One chunk of an upload. `filename` is only read from the first chunk.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadRequest {
    #[prost(string, tag = "1")]
    pub filename: String,
    #[prost(bytes = "bytes", tag = "2")]
    pub content: Bytes,
}

/// Marks the end of the client stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EndOfStream {}

/// Envelope for every client-to-server frame.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadFrame {
    #[prost(oneof = "upload_frame::Payload", tags = "1, 2")]
    pub payload: Option<upload_frame::Payload>,
}

pub mod upload_frame {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        Chunk(super::UploadRequest),
        #[prost(message, tag = "2")]
        End(super::EndOfStream),
    }
}

/// Final response, sent once after the stream ends.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadStatus {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub video_id: String,
    #[prost(enumeration = "Code", tag = "4")]
    pub code: i32,
}

/// Status codes, numbered like their gRPC counterparts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Code {
    Ok = 0,
    Unknown = 2,
    InvalidArgument = 3,
    ResourceExhausted = 8,
    Internal = 13,
}

impl Code {
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::Internal => "INTERNAL",
        }
    }
}

impl UploadFrame {
    pub fn chunk(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        UploadFrame {
            payload: Some(upload_frame::Payload::Chunk(UploadRequest {
                filename: filename.into(),
                content: content.into(),
            })),
        }
    }

    pub fn end() -> Self {
        UploadFrame {
            payload: Some(upload_frame::Payload::End(EndOfStream {})),
        }
    }
}

impl UploadStatus {
    pub fn admitted(video_id: impl Into<String>) -> Self {
        UploadStatus {
            message: "Upload successful".to_string(),
            success: true,
            video_id: video_id.into(),
            code: Code::Ok as i32,
        }
    }

    pub fn failed(err: &SessionError, video_id: Option<&str>) -> Self {
        UploadStatus {
            message: err.to_string(),
            success: false,
            video_id: video_id.unwrap_or_default().to_string(),
            code: err.code() as i32,
        }
    }
}
