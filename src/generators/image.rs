//! Image domain inference by magic bytes.

use anyhow::Result;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

use super::CombinerFeatureStatsGenerator;
use crate::histogram::rank_histogram;
use crate::options::StatsOptions;
use crate::statistics::{CustomStatistic, FeatureNameStatistics};
use crate::types::{FeatureColumn, FeatureValues};

pub const IMAGE_GENERATOR_NAME: &str = "image_domain";
pub const IMAGE_DOMAIN_INFO: &str = "image_domain {}";
pub const IMAGE_FORMAT_HISTOGRAM: &str = "image_format_histogram";
pub const UNKNOWN_IMAGE_FORMAT: &str = "UNKNOWN";

/// The image format whose signature `value` starts with, if any.
#[must_use]
pub fn sniff_image_format(value: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG: &[u8] = b"\xff\xd8\xff";
    match value {
        v if v.starts_with(PNG) => Some("png"),
        v if v.starts_with(JPEG) => Some("jpeg"),
        v if v.starts_with(b"GIF87a") || v.starts_with(b"GIF89a") => Some("gif"),
        // BM plus a full 14-byte file header
        v if v.starts_with(b"BM") && v.len() >= 14 => Some("bmp"),
        v if v.len() >= 12 && v.starts_with(b"RIFF") && &v[8..12] == b"WEBP" => Some("webp"),
        v if v.starts_with(b"II*\0") || v.starts_with(b"MM\0*") => Some("tiff"),
        _ => None,
    }
}

/// Marks byte features whose values are mostly images.
#[derive(Clone, Debug)]
pub struct ImageDomainGenerator {
    match_threshold: f64,
    min_examples: u64,
}

impl Default for ImageDomainGenerator {
    fn default() -> Self {
        Self::from_options(&StatsOptions::default())
    }
}

impl ImageDomainGenerator {
    #[must_use]
    pub const fn from_options(options: &StatsOptions) -> Self {
        Self {
            match_threshold: options.image_match_threshold,
            min_examples: options.semantic_domain_min_examples,
        }
    }
}

/// Format-name occurrence counts, `UNKNOWN` included.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageAccumulator {
    non_missing_examples: u64,
    formats: BTreeMap<&'static str, u64>,
}

impl ImageAccumulator {
    fn num_values(&self) -> u64 {
        self.formats.values().sum()
    }

    fn num_unknown(&self) -> u64 {
        self.formats.get(UNKNOWN_IMAGE_FORMAT).copied().unwrap_or(0)
    }
}

impl CombinerFeatureStatsGenerator for ImageDomainGenerator {
    type Accumulator = ImageAccumulator;

    fn name(&self) -> &str {
        IMAGE_GENERATOR_NAME
    }

    fn create_accumulator(&self) -> ImageAccumulator {
        ImageAccumulator::default()
    }

    fn add_input(&self, acc: &mut ImageAccumulator, _feature: &str, column: &FeatureColumn) {
        for cell in column {
            let Some(FeatureValues::Bytes(values)) = cell else {
                continue;
            };
            acc.non_missing_examples += 1;
            for value in values {
                let format = sniff_image_format(value).unwrap_or(UNKNOWN_IMAGE_FORMAT);
                *acc.formats.entry(format).or_default() += 1;
            }
        }
    }

    fn merge_into(&self, acc: &mut ImageAccumulator, other: &ImageAccumulator) {
        acc.non_missing_examples += other.non_missing_examples;
        for (format, count) in &other.formats {
            *acc.formats.entry(*format).or_default() += count;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn extract_output(&self, feature: &str, acc: &ImageAccumulator) -> Result<FeatureNameStatistics> {
        let mut out = FeatureNameStatistics::new(feature);
        let total = acc.num_values();
        if total == 0 {
            return Ok(out);
        }
        if acc.non_missing_examples < self.min_examples {
            debug!(
                feature,
                examples = acc.non_missing_examples,
                min_examples = self.min_examples,
                "too few examples for image inference"
            );
            return Ok(out);
        }
        let rate = (total - acc.num_unknown()) as f64 / total as f64;
        if rate < self.match_threshold {
            return Ok(out);
        }
        let mut ranked: Vec<(&str, u64)> = acc.formats.iter().map(|(f, c)| (*f, *c)).collect();
        ranked.sort_by_key(|(format, count)| (Reverse(*count), *format));
        out.custom_stats
            .push(CustomStatistic::str("domain_info", IMAGE_DOMAIN_INFO));
        out.custom_stats.push(CustomStatistic::rank_histogram(
            IMAGE_FORMAT_HISTOGRAM,
            rank_histogram(ranked.into_iter().map(|(f, c)| (f.to_string(), c as f64))),
        ));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        assert_eq!(sniff_image_format(b"\x89PNG\r\n\x1a\n rest"), Some("png"));
        assert_eq!(sniff_image_format(b"\xff\xd8\xff\xe0"), Some("jpeg"));
        assert_eq!(sniff_image_format(b"GIF89a..."), Some("gif"));
        assert_eq!(sniff_image_format(b"BM"), None);
        assert_eq!(sniff_image_format(b"BM012345678901"), Some("bmp"));
        assert_eq!(sniff_image_format(b"RIFF\0\0\0\0WEBPVP8 "), Some("webp"));
        assert_eq!(sniff_image_format(b"II*\0"), Some("tiff"));
        assert_eq!(sniff_image_format(b"hello"), None);
    }

    #[test]
    fn histogram_ranks_formats_including_unknown() {
        let generator = ImageDomainGenerator {
            match_threshold: 0.5,
            min_examples: 1,
        };
        let column = vec![
            Some(FeatureValues::bytes([b"\x89PNG\r\n\x1a\n".as_slice()])),
            Some(FeatureValues::bytes([b"\x89PNG\r\n\x1a\n".as_slice()])),
            Some(FeatureValues::bytes([b"GIF87a".as_slice()])),
            Some(FeatureValues::bytes([b"text".as_slice()])),
        ];
        let mut acc = generator.create_accumulator();
        generator.add_input(&mut acc, "img", &column);
        let out = generator.extract_output("img", &acc).unwrap();
        let hist = out
            .custom_stat(IMAGE_FORMAT_HISTOGRAM)
            .and_then(|s| s.rank_histogram.as_ref())
            .unwrap();
        let labels: Vec<&str> = hist.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["png", "UNKNOWN", "gif"]);
        assert!((hist.buckets[0].sample_count - 2.0).abs() < f64::EPSILON);
    }
}
