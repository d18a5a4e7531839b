use bitflags::bitflags;
use bstr::ByteSlice;
use cqdb::CQDB;

use crate::dictionary::{FeatureMap, LabelMap};
use crate::error::{Error, Result};
use crate::vector::Layout;

pub(crate) const MAGIC: &[u8; 4] = b"LMDL";
pub(crate) const WEIGHT_CHUNK: &[u8; 4] = b"WGHT";
pub(crate) const VERSION: u32 = 1;
pub(crate) const HEADER_SIZE: usize = 44;

bitflags! {
    /// Model header flags
    #[derive(Default)]
    pub(crate) struct Flag: u32 {
        /// Weights use the binary layout
        const BINARY = 0x01;
        /// A feature dictionary follows the label dictionary
        const FEATURES = 0x02;
    }
}

impl Flag {
    pub(crate) fn layout(&self) -> Layout {
        if self.contains(Flag::BINARY) {
            Layout::Binary
        } else {
            Layout::Multi
        }
    }
}

#[inline]
pub(crate) fn unpack_u32(buf: &[u8]) -> Result<u32> {
    if buf.len() < 4 {
        return Err(Error::format("not enough data for unpacking u32"));
    }
    Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

#[inline]
fn unpack_f32(buf: &[u8]) -> Result<f32> {
    if buf.len() < 4 {
        return Err(Error::format("not enough data for unpacking f32"));
    }
    Ok(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

/// Join a typed feature key for the feature dictionary
pub(crate) fn feature_key(ftype: u32, value: &str) -> String {
    format!("{}:{}", ftype, value)
}

fn split_feature_key(key: &str) -> Option<(u32, &str)> {
    let (ftype, value) = key.split_once(':')?;
    Some((ftype.parse().ok()?, value))
}

#[derive(Debug, Clone)]
pub(crate) struct Header {
    pub(crate) version: u32,
    pub(crate) flags: Flag,
    pub(crate) num_labels: u32,
    pub(crate) num_features: u32,
    pub(crate) num_weights: u32,
    pub(crate) off_labels: u32,
    pub(crate) size_labels: u32,
    pub(crate) off_features: u32,
    pub(crate) size_features: u32,
    pub(crate) off_weights: u32,
}

impl Header {
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(MAGIC);
        for field in [
            self.version,
            self.flags.bits(),
            self.num_labels,
            self.num_features,
            self.num_weights,
            self.off_labels,
            self.size_labels,
            self.off_features,
            self.size_features,
            self.off_weights,
        ] {
            buf.extend_from_slice(&field.to_le_bytes());
        }
        buf
    }

    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::format("file too small"));
        }
        if &buf[0..4] != MAGIC {
            return Err(Error::format("magic mismatch"));
        }
        let mut fields = [0u32; 10];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = unpack_u32(&buf[4 + 4 * i..])?;
        }
        let flags = Flag::from_bits(fields[1])
            .ok_or_else(|| Error::format(format!("unknown flags {:#X}", fields[1])))?;
        Ok(Self {
            version: fields[0],
            flags,
            num_labels: fields[2],
            num_features: fields[3],
            num_weights: fields[4],
            off_labels: fields[5],
            size_labels: fields[6],
            off_features: fields[7],
            size_features: fields[8],
            off_weights: fields[9],
        })
    }
}

/// Everything decoded from a model buffer
#[derive(Debug)]
pub(crate) struct ModelData {
    pub(crate) labels: LabelMap,
    pub(crate) features: Option<FeatureMap>,
    pub(crate) feature_count: usize,
    pub(crate) weights: Vec<f32>,
}

fn section(buf: &[u8], offset: u32, size: u32) -> Result<&[u8]> {
    let start = offset as usize;
    let end = start
        .checked_add(size as usize)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| Error::format("section out of bounds"))?;
    Ok(&buf[start..end])
}

impl ModelData {
    /// Decode a model, checking it against the expected weight layout
    pub(crate) fn parse(buf: &[u8], expected: Layout) -> Result<Self> {
        let header = Header::parse(buf)?;
        if header.version != VERSION {
            return Err(Error::format(format!(
                "unsupported version {}",
                header.version
            )));
        }
        let layout = header.flags.layout();
        if layout != expected {
            return Err(Error::LayoutMismatch {
                expected: expected.name(),
                found: layout.name(),
            });
        }

        let db = CQDB::new(section(buf, header.off_labels, header.size_labels)?)?;
        let mut labels = Vec::with_capacity(header.num_labels as usize);
        for id in 0..header.num_labels {
            let label = db
                .to_str(id)
                .and_then(|s| s.to_str().ok())
                .ok_or_else(|| Error::format(format!("missing label {}", id)))?;
            labels.push(label.to_string());
        }
        let labels = LabelMap::from_labels(labels)?;

        let features = if header.flags.contains(Flag::FEATURES) {
            let db = CQDB::new(section(buf, header.off_features, header.size_features)?)?;
            let mut features = FeatureMap::new();
            for id in 1..header.num_features {
                let (ftype, value) = db
                    .to_str(id)
                    .and_then(|s| s.to_str().ok())
                    .and_then(split_feature_key)
                    .ok_or_else(|| Error::format(format!("missing feature {}", id)))?;
                features.push_indexed(ftype, value.to_string(), id as usize)?;
            }
            Some(features)
        } else {
            None
        };

        let chunk = &buf[(header.off_weights as usize).min(buf.len())..];
        if chunk.len() < 8 || &chunk[0..4] != WEIGHT_CHUNK {
            return Err(Error::format("missing weight chunk"));
        }
        let count = unpack_u32(&chunk[4..])?;
        if count != header.num_weights {
            return Err(Error::format("weight count mismatch"));
        }
        let data = &chunk[8..];
        if data.len() < 4 * count as usize {
            return Err(Error::format("truncated weight chunk"));
        }
        let weights = data
            .chunks_exact(4)
            .take(count as usize)
            .map(unpack_f32)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            labels,
            features,
            feature_count: header.num_features as usize,
            weights,
        })
    }
}
