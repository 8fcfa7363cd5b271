//! Glyph records and datasets.
//!
//! An [`Image`] is a 1-based letter label plus a normalized pixel vector. A
//! [`Dataset`] is an ordered list of images; the driver shuffles indices into it and
//! never reorders the stored records.

use std::path::Path;

use csv::ReaderBuilder;

use crate::{Error, Result};

pub const HEIGHT: usize = 28;
pub const WIDTH: usize = 28;
/// Pixels per glyph.
pub const PIXELS: usize = HEIGHT * WIDTH;
/// Number of classes (`A..=Z`).
pub const LETTERS: usize = 26;
/// Raw pixel intensity that normalizes to `1.0`.
pub const MAX_PIXEL: f64 = 255.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    label: usize,
    pixels: Vec<f64>,
}

impl Image {
    /// `pixels` must already be normalized to `[0, 1]`.
    pub fn new(label: usize, pixels: Vec<f64>) -> Self {
        Self { label, pixels }
    }

    /// Normalize raw `0..=255` intensities.
    pub fn from_raw(label: usize, raw: &[f64]) -> Self {
        Self {
            label,
            pixels: raw.iter().map(|p| p / MAX_PIXEL).collect(),
        }
    }

    #[inline]
    pub fn label(&self) -> usize {
        self.label
    }

    #[inline]
    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    /// The letter for this label (`1 -> 'A'`), if the label is in `1..=26`.
    pub fn letter(&self) -> Option<char> {
        label_to_letter(self.label)
    }
}

/// `1 -> 'A'`, ..., `26 -> 'Z'`.
pub fn label_to_letter(label: usize) -> Option<char> {
    if (1..=LETTERS).contains(&label) {
        char::from_u32('A' as u32 + (label - 1) as u32)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    images: Vec<Image>,
}

impl Dataset {
    pub fn new(images: Vec<Image>) -> Self {
        Self { images }
    }

    /// Read EMNIST-style CSV rows: `label,p0,...,p783` with raw `0..=255` pixels.
    pub fn load_emnist<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(p)
            .map_err(|e| Error::Io(format!("failed to open {}: {e}", p.display())))?;

        let mut images = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| Error::Io(format!("failed to read {}: {e}", p.display())))?;
            images.push(parse_record(&record, line + 1)?);
        }

        Ok(Self { images })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Panics if `idx >= len`.
    #[inline]
    pub fn get(&self, idx: usize) -> &Image {
        &self.images[idx]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Image> {
        self.images.iter()
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }
}

impl From<Vec<Image>> for Dataset {
    fn from(images: Vec<Image>) -> Self {
        Self::new(images)
    }
}

impl FromIterator<Image> for Dataset {
    fn from_iter<I: IntoIterator<Item = Image>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn parse_record(record: &csv::StringRecord, line: usize) -> Result<Image> {
    if record.len() != PIXELS + 1 {
        return Err(Error::InvalidData(format!(
            "line {line}: expected {} fields, got {}",
            PIXELS + 1,
            record.len()
        )));
    }

    let mut fields = record.iter().map(str::trim);
    let label = fields
        .next()
        .unwrap_or_default()
        .parse::<usize>()
        .map_err(|e| Error::InvalidData(format!("line {line}: bad label: {e}")))?;

    let mut pixels = Vec::with_capacity(PIXELS);
    for field in fields {
        let raw = field
            .parse::<u8>()
            .map_err(|e| Error::InvalidData(format!("line {line}: bad pixel {field:?}: {e}")))?;
        pixels.push(f64::from(raw) / MAX_PIXEL);
    }

    Ok(Image::new(label, pixels))
}
