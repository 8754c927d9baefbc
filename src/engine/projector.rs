//! Channel projector
//!
//! Maps the buffer prefix onto one [`ChannelSeries`] per plotted channel.
//! Each point is `[x, value]`, where x is the record's buffer position or
//! the value of a configured numeric field.
//!
//! An absent value is a gap: no point is emitted for that channel and the
//! record position is listed in [`ChannelSeries::gaps`]. Other channels of
//! the same record are unaffected.
//!
//! Updates are incremental. The projector remembers how many records it
//! has seen and only walks the new suffix on each call.

use serde::Serialize;

use crate::config::{ChannelSet, XAxis};
use crate::types::TelemetryRecord;

/// Ordered points for one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSeries {
    pub name: String,
    pub label: String,
    pub unit: String,
    points: Vec<[f64; 2]>,
    gaps: Vec<usize>,
}

impl ChannelSeries {
    fn new(name: &str, label: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
            points: Vec::new(),
            gaps: Vec::new(),
        }
    }

    /// `[x, value]` pairs in buffer order
    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Buffer positions whose value was absent
    pub fn gaps(&self) -> &[usize] {
        &self.gaps
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<[f64; 2]> {
        self.points.last().copied()
    }

    /// Just the values, without x
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p[1])
    }

    fn clear(&mut self) {
        self.points.clear();
        self.gaps.clear();
    }
}

/// Channel name to series mapping for one buffer prefix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelProjection {
    series: Vec<ChannelSeries>,
    records: usize,
}

impl ChannelProjection {
    pub fn get(&self, name: &str) -> Option<&ChannelSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChannelSeries> {
        self.series.iter()
    }

    /// Number of series (plotted channels)
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// How many records of the prefix have been incorporated
    pub fn records(&self) -> usize {
        self.records
    }
}

impl<'a> IntoIterator for &'a ChannelProjection {
    type Item = &'a ChannelSeries;
    type IntoIter = std::slice::Iter<'a, ChannelSeries>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.iter()
    }
}

/// Incremental projector over a fixed channel table
#[derive(Debug, Clone)]
pub struct ChannelProjector {
    /// Channel-set position of each series, parallel to `projection.series`
    sources: Vec<usize>,
    /// Channel-set position of the x field, if not indexing by position
    x_field: Option<usize>,
    projection: ChannelProjection,
}

impl ChannelProjector {
    /// Build the name-to-series table once from the channel set
    ///
    /// An `XAxis::Field` naming an unknown channel falls back to indexing;
    /// configuration validation rejects that case before it gets here.
    pub fn new(channels: &ChannelSet, x_axis: &XAxis) -> Self {
        let (sources, series): (Vec<usize>, Vec<ChannelSeries>) = channels
            .plotted()
            .map(|(index, spec)| {
                (
                    index,
                    ChannelSeries::new(&spec.name, spec.display_label(), &spec.unit),
                )
            })
            .unzip();

        let x_field = match x_axis {
            XAxis::Index => None,
            XAxis::Field(name) => channels.index_of(name),
        };

        Self {
            sources,
            x_field,
            projection: ChannelProjection { series, records: 0 },
        }
    }

    /// Project a prefix from scratch
    pub fn project(channels: &ChannelSet, x_axis: &XAxis, prefix: &[TelemetryRecord]) -> ChannelProjection {
        let mut projector = Self::new(channels, x_axis);
        projector.update(prefix);
        projector.projection
    }

    /// Incorporate records past the last update; returns how many were new
    ///
    /// A prefix shorter than what was already seen means the buffer was
    /// cleared behind our back, so the projection is rebuilt.
    pub fn update(&mut self, prefix: &[TelemetryRecord]) -> usize {
        if prefix.len() < self.projection.records {
            tracing::debug!(
                "prefix shrank from {} to {}, rebuilding projection",
                self.projection.records,
                prefix.len()
            );
            self.reset();
        }

        let start = self.projection.records;
        for (position, record) in prefix.iter().enumerate().skip(start) {
            let x = match self.x_field {
                None => position as f64,
                Some(field) => match record.value(field).as_number() {
                    Some(x) => x,
                    None => continue,
                },
            };

            for (series, &source) in self.projection.series.iter_mut().zip(&self.sources) {
                match record.value(source).as_number() {
                    Some(y) => series.points.push([x, y]),
                    None => series.gaps.push(position),
                }
            }
        }
        self.projection.records = prefix.len();

        prefix.len() - start
    }

    /// Drop every point, keeping the channel table
    pub fn reset(&mut self) {
        for series in &mut self.projection.series {
            series.clear();
        }
        self.projection.records = 0;
    }

    pub fn projection(&self) -> &ChannelProjection {
        &self.projection
    }
}
