//! File name scheme templates.
//!
//! A scheme is a `/`-separated template such as `{guild}/{channel}/{message_id}_{filename}`.
//! Literal text comes from configuration; placeholder values come from the platform and are
//! sanitized into single path components, so a crafted filename can never add a directory level.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::sanitize::{guard_component, sanitize_component};
use crate::platform::MessageId;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemeError {
    #[error("file name scheme is empty")]
    Empty,
    #[error("file name scheme must be relative to the operating folder")]
    Absolute,
    #[error("file name scheme contains an empty, '.' or '..' path component")]
    BadComponent,
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("unclosed '{{' in file name scheme")]
    Unclosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Guild,
    Channel,
    Author,
    MessageId,
    Filename,
    Timestamp,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "guild" => Field::Guild,
            "channel" => Field::Channel,
            "author" => Field::Author,
            "message_id" | "id" => Field::MessageId,
            "filename" | "name" => Field::Filename,
            "timestamp" => Field::Timestamp,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field(Field),
}

/// Values substituted into a scheme for one attachment.
#[derive(Debug, Clone)]
pub struct AttachmentContext<'a> {
    pub guild: &'a str,
    pub channel: &'a str,
    pub author: &'a str,
    pub message_id: MessageId,
    pub filename: &'a str,
    pub timestamp: DateTime<Utc>,
}

impl AttachmentContext<'_> {
    fn value(&self, field: Field) -> String {
        match field {
            Field::Guild => self.guild.to_string(),
            Field::Channel => self.channel.to_string(),
            Field::Author => self.author.to_string(),
            Field::MessageId => self.message_id.to_string(),
            Field::Filename => self.filename.to_string(),
            Field::Timestamp => self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Parsed, validated file name scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameScheme {
    segments: Vec<Vec<Piece>>,
}

impl FileNameScheme {
    pub const DEFAULT: &'static str = "{guild}/{channel}/{message_id}_{filename}";

    pub fn parse(template: &str) -> Result<Self, SchemeError> {
        let template = template.trim();
        if template.is_empty() {
            return Err(SchemeError::Empty);
        }
        if template.starts_with('/') || template.starts_with('\\') {
            return Err(SchemeError::Absolute);
        }
        let segments = template
            .split(['/', '\\'])
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    /// Render to a relative path. Every component of the result is a normal file name.
    pub fn render(&self, ctx: &AttachmentContext<'_>) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in &self.segments {
            let mut s = String::new();
            for piece in segment {
                match piece {
                    Piece::Literal(text) => s.push_str(text),
                    Piece::Field(f) => s.push_str(&sanitize_component(&ctx.value(*f))),
                }
            }
            // Literal text next to a value can still form "." or "..", or overflow NAME_MAX.
            path.push(guard_component(&s));
        }
        path
    }
}

fn parse_segment(segment: &str) -> Result<Vec<Piece>, SchemeError> {
    let mut pieces = Vec::new();
    let mut rest = segment;
    while !rest.is_empty() {
        match rest.find('{') {
            Some(0) => {
                let close = rest.find('}').ok_or(SchemeError::Unclosed)?;
                let name = &rest[1..close];
                let field = Field::parse(name.trim())
                    .ok_or_else(|| SchemeError::UnknownPlaceholder(name.to_string()))?;
                pieces.push(Piece::Field(field));
                rest = &rest[close + 1..];
            }
            Some(open) => {
                pieces.push(Piece::Literal(rest[..open].to_string()));
                rest = &rest[open..];
            }
            None => {
                pieces.push(Piece::Literal(rest.to_string()));
                rest = "";
            }
        }
    }
    let only_literal: Option<String> = pieces
        .iter()
        .map(|p| match p {
            Piece::Literal(t) => Some(t.as_str()),
            Piece::Field(_) => None,
        })
        .collect();
    if let Some(text) = only_literal {
        let text = text.trim();
        if text.is_empty() || text == "." || text == ".." {
            return Err(SchemeError::BadComponent);
        }
    }
    Ok(pieces)
}
