//! Fluent builders for examples and batches.

use crate::types::{Example, FeatureValues, RecordBatch};

/// Builds one [`Example`].
///
/// ```
/// use featstats::testing::ExampleBuilder;
///
/// let ex = ExampleBuilder::new()
///     .ints("age", [42])
///     .strings("tags", ["a", "b"])
///     .missing("score")
///     .build();
/// assert_eq!(ex.len(), 3);
/// assert!(ex["score"].is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ExampleBuilder {
    example: Example,
}

impl ExampleBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ints(self, name: &str, values: impl IntoIterator<Item = i64>) -> Self {
        self.values(name, FeatureValues::ints(values))
    }

    #[must_use]
    pub fn floats(self, name: &str, values: impl IntoIterator<Item = f64>) -> Self {
        self.values(name, FeatureValues::floats(values))
    }

    #[must_use]
    pub fn strings<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.values(name, FeatureValues::strings(values))
    }

    #[must_use]
    pub fn bytes<I, B>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.values(name, FeatureValues::bytes(values))
    }

    #[must_use]
    pub fn values(mut self, name: &str, values: FeatureValues) -> Self {
        self.example.insert(name.to_string(), Some(values));
        self
    }

    /// Add `name` with a missing cell.
    #[must_use]
    pub fn missing(mut self, name: &str) -> Self {
        self.example.insert(name.to_string(), None);
        self
    }

    #[must_use]
    pub fn build(self) -> Example {
        self.example
    }
}

/// Builds a [`RecordBatch`] row by row.
#[derive(Clone, Debug, Default)]
pub struct BatchBuilder {
    examples: Vec<Example>,
}

impl BatchBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn example(mut self, example: Example) -> Self {
        self.examples.push(example);
        self
    }

    #[must_use]
    pub fn examples(mut self, examples: impl IntoIterator<Item = Example>) -> Self {
        self.examples.extend(examples);
        self
    }

    /// Add `count` copies of `example`.
    #[must_use]
    pub fn repeat(mut self, example: &Example, count: usize) -> Self {
        self.examples
            .extend(std::iter::repeat_n(example, count).cloned());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    #[must_use]
    pub fn build(self) -> RecordBatch {
        RecordBatch::from_examples(&self.examples)
    }

    /// The rows as examples, for the in-memory entry point.
    #[must_use]
    pub fn build_examples(self) -> Vec<Example> {
        self.examples
    }
}
