//! Interoperability with [`anyhow`], enabled by the `anyhow` feature.

use std::error::Error;

use crate::{collector::as_aggregate, Collector, SharedError};

impl Collector {
    /// Adds an [`anyhow::Error`] to this `Collector`.
    ///
    /// Flattens like [`push`](Collector::push) does when any error in the chain, including
    /// those added with `context`, is a [`MultiError`](crate::MultiError).
    pub fn push_anyhow(&mut self, error: anyhow::Error) {
        if let Some(multi) = error.chain().find_map(as_aggregate) {
            self.absorb(multi);
            return;
        }
        self.push(from_anyhow(error));
    }
}

/// Converts an [`anyhow::Error`] into a [`SharedError`]. The `Display` output is the outermost
/// message only, as with `anyhow`'s own non-alternate formatting.
pub fn from_anyhow(error: anyhow::Error) -> SharedError {
    let boxed: Box<dyn Error + Send + Sync + 'static> = error.into();
    SharedError::from(boxed)
}
