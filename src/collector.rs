use std::{error::Error, iter, sync::Arc};

use log::{debug, trace};

use crate::{MultiError, SharedError};

/// Something which accepts the errors produced by a batch of fallible operations.
///
/// This lets helper functions report their failures into whatever collection their caller is
/// building, without knowing its concrete type.
///
/// ```
/// # use std::{fs, io, path::Path};
/// # use errmerge::{Collector, ErrorCollector};
/// fn read_all(paths: &[&Path], errors: &mut impl ErrorCollector) -> Vec<String> {
///     paths
///         .iter()
///         .filter_map(|path| errors.push_result(fs::read_to_string(path)))
///         .collect()
/// }
///
/// let mut errors = Collector::new();
/// let contents = read_all(&[Path::new("/does/not/exist")], &mut errors);
///
/// assert!(contents.is_empty());
/// assert_eq!(errors.len(), 1);
/// ```
pub trait ErrorCollector {
    /// Add a shared error to the collection. `None` is ignored.
    fn push_shared(&mut self, error: Option<SharedError>);

    /// Add a new error to the collection.
    fn push_error<E>(&mut self, error: E)
    where
        E: Error + Send + Sync + 'static,
    {
        self.push_shared(Some(into_shared(error)));
    }

    /// Unwraps the value of a successful result, or adds the error of a failed one to the
    /// collection and returns `None`.
    fn push_result<T, E>(&mut self, result: Result<T, E>) -> Option<T>
    where
        E: Error + Send + Sync + 'static,
    {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.push_error(error);
                None
            }
        }
    }
}

/// Converts a concrete error into a [`SharedError`], without double-wrapping values which already
/// are one.
fn into_shared<E>(error: E) -> SharedError
where
    E: Error + Send + Sync + 'static,
{
    let boxed: Box<dyn Error + Send + Sync + 'static> = Box::new(error);
    match boxed.downcast::<SharedError>() {
        Ok(shared) => *shared,
        Err(boxed) => Arc::from(boxed),
    }
}

/// Returns the [`MultiError`] behind one link of a source chain, either held directly or as a
/// [`SharedError`].
pub(crate) fn as_aggregate<'a>(error: &'a (dyn Error + 'static)) -> Option<&'a MultiError> {
    error.downcast_ref::<MultiError>().or_else(|| {
        error
            .downcast_ref::<SharedError>()
            .and_then(|shared| shared.downcast_ref::<MultiError>())
    })
}

/// Finds the first [`MultiError`] in an error's [`source`](Error::source) chain, starting with
/// the error itself.
pub(crate) fn find_aggregate<'a>(error: &'a (dyn Error + 'static)) -> Option<&'a MultiError> {
    iter::successors(Some(error), |&e| e.source()).find_map(as_aggregate)
}

/// An ordered collection of the errors produced by a batch of operations, which can be merged
/// into a single error with [`finalize`].
///
/// Errors are kept in the order they were pushed, and are not deduplicated. Pushing `None` does
/// nothing, and pushing a [`MultiError`] (or any error which has one in its source chain) appends
/// the aggregate's errors rather than nesting it.
///
/// ```
/// # use std::{io, sync::Arc};
/// # use errmerge::{Collector, MultiError, SharedError};
/// fn check(n: u32) -> Option<SharedError> {
///     (n % 2 == 1).then(|| Arc::new(io::Error::other(format!("{n} is odd"))) as SharedError)
/// }
///
/// let mut errors = Collector::new();
/// for n in 1..=4 {
///     errors.push(check(n));
/// }
///
/// let err = errors.finalize().unwrap_err();
/// assert_eq!(err.to_string(), "2 errors: 1 is odd; 3 is odd");
/// assert!(err.is::<MultiError>());
/// ```
///
/// `Collector` is not synchronized. Operations which run on several threads should hand their
/// errors back to one thread to be pushed:
///
/// ```
/// # use std::{io, sync::Arc, thread};
/// # use errmerge::{Collector, SharedError};
/// let mut errors = Collector::new();
/// thread::scope(|s| {
///     let handles: Vec<_> = (0..3)
///         .map(|i| s.spawn(move || (i > 0).then(|| {
///             Arc::new(io::Error::other(format!("worker {i} failed"))) as SharedError
///         })))
///         .collect();
///
///     for handle in handles {
///         errors.push(handle.join().unwrap());
///     }
/// });
///
/// assert_eq!(
///     errors.finalize().unwrap_err().to_string(),
///     "2 errors: worker 1 failed; worker 2 failed",
/// );
/// ```
///
/// [`finalize`]: Collector::finalize
#[derive(Debug, Clone, Default)]
pub struct Collector {
    errors: Vec<SharedError>,
}

impl Collector {
    /// Constructs a new empty `Collector`.
    #[must_use]
    pub fn new() -> Self {
        Collector { errors: vec![] }
    }

    /// Constructs a new empty `Collector` with room for `capacity` errors.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Collector {
            errors: Vec::with_capacity(capacity),
        }
    }

    /// Adds an error to this `Collector`.
    ///
    /// `None` is ignored. If the error is, or wraps, a [`MultiError`], each of its errors is added
    /// instead.
    ///
    /// ```
    /// # use std::{io, sync::Arc};
    /// # use errmerge::{merge, Collector, SharedError};
    /// let a: SharedError = Arc::new(io::Error::other("a"));
    /// let b: SharedError = Arc::new(io::Error::other("b"));
    /// let c: SharedError = Arc::new(io::Error::other("c"));
    ///
    /// let mut errors = Collector::new();
    /// errors.push(merge([a.clone(), b.clone()]).unwrap_err());
    /// errors.push(None);
    /// errors.push(c.clone());
    ///
    /// assert_eq!(errors.len(), 3);
    /// assert!(Arc::ptr_eq(&errors.errors()[0], &a));
    /// assert!(Arc::ptr_eq(&errors.errors()[2], &c));
    /// ```
    pub fn push(&mut self, error: impl Into<Option<SharedError>>) {
        let Some(error) = error.into() else {
            return;
        };

        if let Some(multi) = find_aggregate(&*error) {
            self.absorb(multi);
            return;
        }
        self.errors.push(error);
    }

    /// Appends the errors of an aggregate, flattening it.
    pub(crate) fn absorb(&mut self, multi: &MultiError) {
        trace!("flattening aggregate of {} error(s)", multi.len());
        self.errors.extend(multi.iter().cloned());
    }

    /// The number of errors collected so far.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if no errors have been collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Inspect the errors collected so far.
    pub fn errors(&self) -> &[SharedError] {
        &self.errors
    }

    /// Moves the errors from this `Collector` into another [`ErrorCollector`].
    ///
    /// ```
    /// # use std::{io, sync::Arc};
    /// # use errmerge::{Collector, ErrorCollector};
    /// let mut source = Collector::new();
    /// source.push_error(io::Error::other("oh no!"));
    /// source.push_error(io::Error::other("another error!"));
    /// let mut dest = Collector::new();
    /// dest.push_error(io::Error::other("one last failure!"));
    ///
    /// source.propagate(&mut dest);
    /// assert_eq!(dest.len(), 3);
    /// ```
    pub fn propagate(self, other: &mut impl ErrorCollector) {
        for error in self.errors {
            other.push_shared(Some(error));
        }
    }

    /// Merges the collected errors into a single error, leaving this `Collector` empty.
    ///
    /// The errors are first flattened again, in case the collection was built from a raw list with
    /// `Collector::from`. Then:
    ///
    /// - no errors gives `Ok(())`;
    /// - exactly one error gives that error itself, unwrapped;
    /// - two or more give a [`MultiError`] containing all of them.
    ///
    /// ```
    /// # use std::{io, sync::Arc};
    /// # use errmerge::{Collector, SharedError};
    /// let only: SharedError = Arc::new(io::Error::other("x"));
    ///
    /// let mut errors = Collector::new();
    /// errors.push(only.clone());
    ///
    /// let err = errors.finalize().unwrap_err();
    /// assert!(Arc::ptr_eq(&err, &only));
    /// assert_eq!(err.to_string(), "x");
    ///
    /// // Everything was drained by the first call
    /// assert!(errors.finalize().is_ok());
    /// ```
    pub fn finalize(&mut self) -> Result<(), SharedError> {
        let mut filtered = Collector::with_capacity(self.errors.len());
        for error in self.errors.drain(..) {
            filtered.push(error);
        }

        let mut errors = filtered.errors;
        if errors.len() > 1 {
            debug!("merged {} errors into an aggregate", errors.len());
            return Err(Arc::new(MultiError::new(errors)));
        }
        match errors.pop() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Consumes this `Collector` and merges its errors, like [`finalize`](Collector::finalize).
    pub fn into_result(mut self) -> Result<(), SharedError> {
        self.finalize()
    }
}

impl ErrorCollector for Collector {
    fn push_shared(&mut self, error: Option<SharedError>) {
        Collector::push(self, error);
    }
}

impl From<Vec<SharedError>> for Collector {
    /// Wraps a list of errors as-is. Aggregates in the list are flattened when the `Collector` is
    /// finalized.
    fn from(errors: Vec<SharedError>) -> Self {
        Collector { errors }
    }
}

impl<T: Into<Option<SharedError>>> Extend<T> for Collector {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for error in iter {
            self.push(error);
        }
    }
}

impl<T: Into<Option<SharedError>>> FromIterator<T> for Collector {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut collector = Collector::new();
        collector.extend(iter);
        collector
    }
}

/// Merges a list of errors into a single error.
///
/// Shorthand for collecting the errors into a [`Collector`] and calling
/// [`finalize`](Collector::finalize).
///
/// ```
/// # use std::{io, sync::Arc};
/// # use errmerge::{merge, SharedError};
/// let x: SharedError = Arc::new(io::Error::other("x"));
///
/// assert!(merge(Vec::<SharedError>::new()).is_ok());
/// assert!(merge([None, Some(x.clone()), None]).is_err());
/// assert_eq!(merge([Some(x.clone()), Some(x)]).unwrap_err().to_string(), "2 errors: x; x");
/// ```
pub fn merge<I>(errors: I) -> Result<(), SharedError>
where
    I: IntoIterator,
    I::Item: Into<Option<SharedError>>,
{
    errors.into_iter().collect::<Collector>().into_result()
}

#[cfg(test)]
mod tests {
    use std::{fmt, io};

    use super::*;

    fn err(msg: &str) -> SharedError {
        Arc::new(io::Error::other(msg.to_owned()))
    }

    #[derive(Debug)]
    struct Wrapped(SharedError);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "while working: {}", self.0)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&*self.0)
        }
    }

    #[test]
    fn test_finalize_reflattens_raw_contents() {
        let a = err("a");
        let b = err("b");
        let c = err("c");
        let nested = merge([a.clone(), b.clone()]).unwrap_err();

        let mut errors = Collector::from(vec![nested, c.clone()]);
        let merged = errors.finalize().unwrap_err();
        let multi = merged.downcast_ref::<MultiError>().unwrap();

        assert_eq!(multi.len(), 3);
        for (got, want) in multi.iter().zip([&a, &b, &c]) {
            assert!(Arc::ptr_eq(got, want));
        }
        assert!(multi.iter().all(|e| !e.is::<MultiError>()));
    }

    #[test]
    fn test_raw_single_aggregate_is_not_rewrapped() {
        let nested = merge([err("a"), err("b")]).unwrap_err();
        let merged = Collector::from(vec![nested]).into_result().unwrap_err();
        assert_eq!(merged.to_string(), "2 errors: a; b");
    }

    #[test]
    fn test_find_aggregate_walks_source_chain() {
        let nested = merge([err("a"), err("b")]).unwrap_err();
        let wrapped = Wrapped(Arc::new(Wrapped(nested)));

        let multi = find_aggregate(&wrapped).unwrap();
        assert_eq!(multi.messages(), ["a", "b"]);
        assert!(find_aggregate(&*err("plain")).is_none());
    }

    #[test]
    fn test_find_aggregate_sees_through_shared_source() {
        // Reports the `Arc` itself as its source, as `#[source] SharedError` fields do
        #[derive(Debug)]
        struct Batch(SharedError);

        impl fmt::Display for Batch {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("while running batch")
            }
        }

        impl Error for Batch {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let nested = merge([err("a"), err("b")]).unwrap_err();
        let wrapped = Batch(nested);

        let multi = find_aggregate(&wrapped).unwrap();
        assert_eq!(multi.messages(), ["a", "b"]);
    }

    #[test]
    fn test_push_error_does_not_double_wrap_shared() {
        let nested = merge([err("a"), err("b")]).unwrap_err();

        let mut errors = Collector::new();
        errors.push_error(nested);
        errors.push_error(io::Error::other("c"));

        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_push_result_keeps_values() {
        let mut errors = Collector::new();
        let parsed: Vec<u32> = ["1", "x", "3", "y"]
            .iter()
            .filter_map(|s| errors.push_result(s.parse::<u32>()))
            .collect();

        assert_eq!(parsed, [1, 3]);
        assert_eq!(errors.len(), 2);
        assert!(errors.errors()[0].is::<std::num::ParseIntError>());
    }

    #[test]
    fn test_extend_filters_none() {
        let mut errors = Collector::new();
        errors.extend([None, Some(err("a")), None]);
        assert_eq!(errors.len(), 1);
    }
}
