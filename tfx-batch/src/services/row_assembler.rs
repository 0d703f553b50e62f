//! Row assembly
//!
//! Flattens a catalog record and a feature vector into one output row:
//! `title, artist, release_date, genres, mfcc_0..12,
//! spectral_contrast_0..N-1, chroma_stft_0..11, tempo`.

use crate::types::{
    CatalogRecord, ColumnKind, ColumnValue, FeatureRow, FeatureVector, CHROMA_BINS,
    MFCC_COEFFICIENTS,
};

/// Merge enrichment and features into one row (pure, infallible)
pub fn assemble_row(record: CatalogRecord, features: &FeatureVector) -> FeatureRow {
    let mut row = FeatureRow::new();
    row.push("title", ColumnValue::Text(record.title));
    row.push("artist", ColumnValue::Text(record.artist));
    row.push("release_date", ColumnValue::NullableText(record.release_date));
    row.push("genres", ColumnValue::TextList(record.genres));

    push_indexed(&mut row, "mfcc", &features.mfcc);
    push_indexed(&mut row, "spectral_contrast", &features.spectral_contrast);
    push_indexed(&mut row, "chroma_stft", &features.chroma_stft);

    row.push("tempo", ColumnValue::Float(features.tempo_bpm));
    row
}

fn push_indexed(row: &mut FeatureRow, prefix: &str, values: &[f64]) {
    for (i, value) in values.iter().enumerate() {
        row.push(format!("{}_{}", prefix, i), ColumnValue::Float(*value));
    }
}

/// Column layout of a row produced with `contrast_bands` contrast values
///
/// Used for the table schema when no row was produced.
pub fn canonical_layout(contrast_bands: usize) -> Vec<(String, ColumnKind)> {
    let mut layout = vec![
        ("title".to_string(), ColumnKind::Text),
        ("artist".to_string(), ColumnKind::Text),
        ("release_date".to_string(), ColumnKind::NullableText),
        ("genres".to_string(), ColumnKind::TextList),
    ];

    let indexed = [
        ("mfcc", MFCC_COEFFICIENTS),
        ("spectral_contrast", contrast_bands),
        ("chroma_stft", CHROMA_BINS),
    ];
    for (prefix, count) in indexed {
        layout.extend((0..count).map(|i| (format!("{}_{}", prefix, i), ColumnKind::Float)));
    }

    layout.push(("tempo".to_string(), ColumnKind::Float));
    layout
}
