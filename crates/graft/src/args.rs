use smallvec::SmallVec;

use crate::value::Value;

/// Call arguments forwarded to a callable.
///
/// Wrappers installed by the interception engine forward these untouched
/// through every layer, so call sites never change how they invoke a patched
/// symbol. The positional buffer is inline for up to four values since most
/// calls pass at most a handful of arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgValues {
    /// Positional arguments, in call order.
    pub positional: SmallVec<[Value; 4]>,
    /// Keyword arguments as `(name, value)` pairs, in call order.
    pub keyword: Vec<(String, Value)>,
}

impl ArgValues {
    /// Creates an empty argument list.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a purely positional argument list.
    #[must_use]
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self { positional: values.into_iter().collect(), keyword: Vec::new() }
    }

    /// Appends a keyword argument, builder-style.
    #[must_use]
    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }

    /// Packs the positional arguments into a tuple value.
    #[must_use]
    pub fn positional_tuple(&self) -> Value {
        Value::Tuple(self.positional.iter().cloned().collect())
    }

    /// Packs the keyword arguments into a tuple of `(name, value)` pairs.
    #[must_use]
    pub fn keyword_tuple(&self) -> Value {
        Value::Tuple(
            self.keyword
                .iter()
                .map(|(name, value)| Value::tuple([Value::str(name.clone()), value.clone()]))
                .collect(),
        )
    }
}

impl<const N: usize> From<[Value; N]> for ArgValues {
    fn from(values: [Value; N]) -> Self {
        Self::positional(values)
    }
}
