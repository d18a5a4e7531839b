use std::io::{Seek, SeekFrom, Write};

use cqdb::CQDBWriter;

use crate::dictionary::{FeatureMap, LabelMap};
use crate::error::{Error, Result};
use crate::format::{self, Flag, Header, HEADER_SIZE, VERSION, WEIGHT_CHUNK};
use crate::vector::{Layout, WeightVector};

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::format(format!("{} exceeds u32::MAX", what)))
}

/// Writes a model in the versioned binary format
pub(crate) struct ModelWriter<'a, W: Write + Seek> {
    writer: &'a mut W,
    /// Stream position of the header; offsets are relative to it
    start: u64,
}

impl<'a, W: Write + Seek> ModelWriter<'a, W> {
    pub(crate) fn new(writer: &'a mut W) -> Result<Self> {
        let start = writer.stream_position()?;
        Ok(Self { writer, start })
    }

    fn position(&mut self) -> Result<u32> {
        let pos = self.writer.stream_position()?;
        to_u32(pos - self.start, "file position")
    }

    /// Write labels, an optional feature dictionary and weights
    pub(crate) fn write<V: WeightVector>(
        mut self,
        labels: &LabelMap,
        features: Option<&FeatureMap>,
        feature_count: usize,
        weights: &V,
    ) -> Result<()> {
        let mut flags = Flag::default();
        if V::LAYOUT == Layout::Binary {
            flags |= Flag::BINARY;
        }
        if features.is_some() {
            flags |= Flag::FEATURES;
        }
        let mut header = Header {
            version: VERSION,
            flags,
            num_labels: to_u32(labels.len() as u64, "label count")?,
            num_features: to_u32(feature_count as u64, "feature count")?,
            num_weights: to_u32(weights.len() as u64, "weight count")?,
            off_labels: 0,
            size_labels: 0,
            off_features: 0,
            size_features: 0,
            off_weights: 0,
        };
        // placeholder, patched once the offsets are known
        self.writer.write_all(&header.to_bytes())?;

        header.off_labels = self.position()?;
        self.write_cqdb(labels.iter().map(|(label, id)| (label.to_string(), id)))?;
        header.size_labels = self.position()? - header.off_labels;

        if let Some(features) = features {
            header.off_features = self.position()?;
            self.write_cqdb(
                features
                    .iter()
                    .map(|(id, ftype, value)| (format::feature_key(ftype, value), id)),
            )?;
            header.size_features = self.position()? - header.off_features;
        }

        self.align_to_u32()?;
        header.off_weights = self.position()?;
        self.writer.write_all(WEIGHT_CHUNK)?;
        self.writer.write_all(&header.num_weights.to_le_bytes())?;
        for w in weights.as_slice() {
            self.writer.write_all(&w.to_le_bytes())?;
        }

        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(self.start))?;
        let bytes = header.to_bytes();
        debug_assert_eq!(bytes.len(), HEADER_SIZE);
        self.writer.write_all(&bytes)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;
        Ok(())
    }

    /// Align the stream position to a 4-byte boundary with zero padding.
    fn align_to_u32(&mut self) -> Result<()> {
        let mut pos = self.position()?;
        while pos % 4 != 0 {
            self.writer.write_all(&[0])?;
            pos += 1;
        }
        Ok(())
    }

    fn write_cqdb<I>(&mut self, entries: I) -> Result<()>
    where
        I: Iterator<Item = (String, usize)>,
    {
        let mut db = CQDBWriter::new(&mut *self.writer)?;
        for (key, id) in entries {
            db.put(&key, to_u32(id as u64, "dictionary id")?)?;
        }
        // the database is flushed when the writer drops
        Ok(())
    }
}
