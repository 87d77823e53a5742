//! Small datasets with known statistics.

use super::builders::ExampleBuilder;
use crate::types::Example;

/// Feature `a` = `[1, 2]`, `[3, 4, NaN, 5]`, `[1]`.
///
/// Mean 8/3, min 1, max 5, one NaN.
#[must_use]
pub fn numeric_examples() -> Vec<Example> {
    vec![
        ExampleBuilder::new().floats("a", [1.0, 2.0]).build(),
        ExampleBuilder::new()
            .floats("a", [3.0, 4.0, f64::NAN, 5.0])
            .build(),
        ExampleBuilder::new().floats("a", [1.0]).build(),
    ]
}

/// Feature `b` = `[a, b, c, e]`, `[d, e, f]`, `[a, b, c]`.
#[must_use]
pub fn string_examples() -> Vec<Example> {
    vec![
        ExampleBuilder::new().strings("b", ["a", "b", "c", "e"]).build(),
        ExampleBuilder::new().strings("b", ["d", "e", "f"]).build(),
        ExampleBuilder::new().strings("b", ["a", "b", "c"]).build(),
    ]
}

/// Feature `text`: `natural` sentences followed by `other` identifier-like
/// values, one value per example.
#[must_use]
pub fn text_examples(natural: usize, other: usize) -> Vec<Example> {
    const SENTENCES: [&str; 4] = [
        "the quick brown fox jumps over the lazy dog",
        "a journey of a thousand miles begins with one step",
        "statistics describe the shape of the data",
        "every feature gets its own summary",
    ];
    (0..natural)
        .map(|i| {
            ExampleBuilder::new()
                .strings("text", [SENTENCES[i % SENTENCES.len()]])
                .build()
        })
        .chain((0..other).map(|i| {
            ExampleBuilder::new()
                .strings("text", [format!("id_{i:06}")])
                .build()
        }))
        .collect()
}
