//! Record parser
//!
//! Turns one [`RawLine`] into a [`TelemetryRecord`] or a [`ParseError`].
//! Parsing has no side effects; the caller supplies the sequence number.
//!
//! A CSV row is mapped through the header read at open time. A live line
//! must carry exactly one field per configured channel, in channel order.
//! In both cases a single unparsable numeric field becomes
//! [`FieldValue::Absent`] rather than rejecting the whole record, unless
//! the channel is marked `required`.

use std::sync::Arc;

use crate::config::{ChannelKind, ChannelSet, ChannelSpec};
use crate::error::{ParseError, ParseErrorKind, Result, TelemetryError};
use crate::source::SourceInfo;
use crate::types::{FieldValue, RawLine, RawPayload, TelemetryRecord};

/// How incoming field positions map onto channel positions
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldLayout {
    /// Field `i` is channel `i`
    Wire,
    /// Field `i` is channel `columns[i]`
    Columns(Vec<usize>),
}

/// Parser bound to a channel set and a field layout
#[derive(Debug, Clone)]
pub struct RecordParser {
    channels: Arc<ChannelSet>,
    layout: FieldLayout,
}

impl RecordParser {
    /// Parser for live lines in channel-set order
    pub fn for_live(channels: Arc<ChannelSet>) -> Self {
        Self {
            channels,
            layout: FieldLayout::Wire,
        }
    }

    /// Parser for CSV rows under the given header
    ///
    /// Every header column must name a configured channel. Configured
    /// channels the header lacks are absent from every record, which is
    /// only allowed if they are not `required`.
    pub fn for_columns(channels: Arc<ChannelSet>, columns: &[String]) -> Result<Self> {
        let mut mapping = Vec::with_capacity(columns.len());
        let mut seen = vec![false; channels.len()];

        for column in columns {
            let Some(index) = channels.index_of(column) else {
                return Err(TelemetryError::Config(format!(
                    "column {:?} is not a configured channel",
                    column
                )));
            };
            if std::mem::replace(&mut seen[index], true) {
                return Err(TelemetryError::Config(format!(
                    "column {} appears more than once in the header",
                    column.trim()
                )));
            }
            mapping.push(index);
        }

        if let Some(spec) = channels
            .specs()
            .iter()
            .zip(&seen)
            .find_map(|(spec, &present)| (spec.required && !present).then_some(spec))
        {
            return Err(TelemetryError::Config(format!(
                "required channel {} is missing from the header",
                spec.name
            )));
        }

        let unmapped = seen.iter().filter(|present| !**present).count();
        if unmapped > 0 {
            tracing::debug!("{} configured channels not in header, treated as absent", unmapped);
        }

        Ok(Self {
            channels,
            layout: FieldLayout::Columns(mapping),
        })
    }

    /// Parser matching what a source reported at open
    pub fn from_source_info(channels: Arc<ChannelSet>, info: &SourceInfo) -> Result<Self> {
        match &info.columns {
            Some(columns) => Self::for_columns(channels, columns),
            None => Ok(Self::for_live(channels)),
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Number of fields every line or row must have
    pub fn expected_fields(&self) -> usize {
        match &self.layout {
            FieldLayout::Wire => self.channels.len(),
            FieldLayout::Columns(mapping) => mapping.len(),
        }
    }

    /// Parse one raw unit into a record carrying `sequence`
    pub fn parse(&self, line: &RawLine, sequence: u64) -> std::result::Result<TelemetryRecord, ParseError> {
        let fail = |kind| ParseError::new(line.offset, kind);

        let fields: Vec<&str> = match &line.payload {
            RawPayload::Line(bytes) => std::str::from_utf8(bytes)
                .map_err(|_| fail(ParseErrorKind::InvalidEncoding))?
                .split(',')
                .collect(),
            RawPayload::Row(raw) => raw
                .iter()
                .map(|f| std::str::from_utf8(f))
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| fail(ParseErrorKind::InvalidEncoding))?,
        };

        let expected = self.expected_fields();
        if fields.len() != expected {
            return Err(fail(ParseErrorKind::WrongFieldCount {
                expected,
                found: fields.len(),
            }));
        }

        let mut values = vec![FieldValue::Absent; self.channels.len()];
        for (position, text) in fields.into_iter().enumerate() {
            let index = match &self.layout {
                FieldLayout::Wire => position,
                FieldLayout::Columns(mapping) => mapping[position],
            };
            let Some(spec) = self.channels.get(index) else {
                continue;
            };
            values[index] = parse_field(spec, text).map_err(fail)?;
        }

        Ok(TelemetryRecord::new(sequence, line.offset, values))
    }
}

/// Decode one field according to its channel kind
fn parse_field(spec: &ChannelSpec, text: &str) -> std::result::Result<FieldValue, ParseErrorKind> {
    let text = text.trim();
    if text.is_empty() {
        return if spec.required {
            Err(ParseErrorKind::MissingField(spec.name.clone()))
        } else {
            Ok(FieldValue::Absent)
        };
    }

    match spec.kind {
        ChannelKind::Text => Ok(FieldValue::Text(text.to_string())),
        ChannelKind::Numeric => match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(FieldValue::Number(v)),
            _ if spec.required => Err(ParseErrorKind::NonNumeric {
                field: spec.name.clone(),
                value: text.to_string(),
            }),
            _ => Ok(FieldValue::Absent),
        },
    }
}
