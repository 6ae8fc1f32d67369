//! Operation requests from the desktop-integration collaborator
//!
//! The context-menu collaborator encodes one operation per message, in a
//! URL-like form: an action path followed by query parameters, with file
//! paths percent-encoded and comma-joined. This module decodes that
//! message into a request the caller can merge with shared defaults and
//! hand to the orchestrator.

use std::path::PathBuf;

use crate::format::ArchiveFormat;
use crate::settings::CompressionLevel;
use crate::{Error, Result};

const SCHEME: &str = "arca://";

/// A decoded collaborator message.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRequest {
    Compress {
        inputs: Vec<PathBuf>,
        format: ArchiveFormat,
        /// Level carried by the message, if any; the caller falls back to
        /// the shared defaults store when absent.
        level: Option<CompressionLevel>,
        use_password: Option<bool>,
    },
    Decompress {
        inputs: Vec<PathBuf>,
        create_new_folder: bool,
    },
}

impl RemoteRequest {
    /// Decode a collaborator message.
    ///
    /// Accepts the message with or without its scheme prefix. Unknown
    /// actions and messages without usable file paths are rejected;
    /// unknown parameter values degrade leniently, the same way the
    /// shared defaults store is read.
    pub fn parse(message: &str) -> Result<RemoteRequest> {
        let message = message.strip_prefix(SCHEME).unwrap_or(message);
        let (action, query) = match message.split_once('?') {
            Some((action, query)) => (action, query),
            None => (message, ""),
        };
        let action = action.trim_matches('/');

        let mut files: Vec<PathBuf> = Vec::new();
        let mut format = None;
        let mut level = None;
        let mut use_password = None;
        let mut create_new_folder = false;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key, percent_decode(value)),
                None => continue,
            };

            match key {
                "files" => {
                    files = value
                        .split(',')
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect();
                }
                "type" => format = Some(value.parse::<ArchiveFormat>()?),
                "level" => level = Some(CompressionLevel::from_choice(&value)),
                "usePassword" => use_password = Some(value == "true"),
                "createNewFolder" => create_new_folder = value == "true",
                _ => {}
            }
        }

        if files.is_empty() {
            return Err(Error::invalid_input(
                "dispatch message carries no file paths",
            ));
        }

        match action {
            "compress" => Ok(RemoteRequest::Compress {
                inputs: files,
                format: format.unwrap_or(ArchiveFormat::Zip),
                level,
                use_password,
            }),
            "decompress" => Ok(RemoteRequest::Decompress {
                inputs: files,
                create_new_folder,
            }),
            other => Err(Error::invalid_input(format!(
                "unknown dispatch action: {other:?}"
            ))),
        }
    }
}

/// Decode `%XX` escapes, leaving malformed sequences untouched.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            if let Some(byte) = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
