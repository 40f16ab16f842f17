use std::{error::Error, fmt, sync::Arc};

/// An error value as stored by a [`Collector`].
///
/// Errors are reference-counted so that the constituents of an aggregate can be absorbed into a
/// new collection even when the aggregate is only reachable through a reference, for example
/// because another error wraps it as its [`source`](Error::source). Absorbed errors keep their
/// identity, which can be checked with [`Arc::ptr_eq`].
///
/// [`Collector`]: crate::Collector
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// Rendered in place of a message when a [`MultiError`] holds no errors at all.
const EMPTY_MESSAGE: &str = "<empty error slice>";

/// Selects how a [`MultiError`] is turned into a string by [`MultiError::render`].
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq)]
pub enum RenderMode {
    /// A single line: `"2 errors: x; y"`. Same as the [`Display`](fmt::Display) output.
    #[default]
    Plain,

    /// The single line message, quoted and escaped as a string literal.
    Quoted,

    /// A header line followed by one indented line per error. Same as the alternate
    /// [`Display`](fmt::Display) output, `{:#}`.
    Expanded,
}

/// Wraps multiple errors which were produced by one batch of operations.
///
/// A `MultiError` is only ever produced by [`Collector::finalize`] (or [`merge`]) when two or
/// more errors were collected, and it never contains another `MultiError`: nested aggregates are
/// flattened while collecting.
///
/// ```
/// # use std::io;
/// # use errmerge::{merge, MultiError, SharedError};
/// # use std::sync::Arc;
/// let x: SharedError = Arc::new(io::Error::other("x"));
/// let y: SharedError = Arc::new(io::Error::other("y"));
///
/// let err = merge([x, y]).unwrap_err();
/// let multi = err.downcast_ref::<MultiError>().unwrap();
///
/// assert_eq!(multi.to_string(), "2 errors: x; y");
/// assert_eq!(format!("{multi:#}"), "2 errors:\n\terror 1: x\n\terror 2: y\n");
/// assert_eq!(multi.messages(), ["x", "y"]);
/// ```
///
/// [`Collector::finalize`]: crate::Collector::finalize
/// [`merge`]: crate::merge
#[derive(Debug, Clone)]
pub struct MultiError {
    errors: Vec<SharedError>,
}

impl MultiError {
    pub(crate) fn new(errors: Vec<SharedError>) -> Self {
        MultiError { errors }
    }

    /// The wrapped errors, in the order they were collected.
    pub fn errors(&self) -> &[SharedError] {
        &self.errors
    }

    /// The message of each wrapped error, in the order they were collected.
    ///
    /// Useful for inspecting individual failures without parsing the combined message.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// The number of wrapped errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if there are no wrapped errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates over the wrapped errors in the order they were collected.
    pub fn iter(&self) -> std::slice::Iter<'_, SharedError> {
        self.errors.iter()
    }

    /// Consumes this `MultiError`, returning the wrapped errors.
    pub fn into_errors(self) -> Vec<SharedError> {
        self.errors
    }

    /// The single line message, `"<N> errors: <msg1>; <msg2>; ..."`.
    pub fn message(&self) -> String {
        self.render(RenderMode::Plain)
    }

    /// The multi-line message, with a header line and one line per error.
    pub fn detailed(&self) -> String {
        self.render(RenderMode::Expanded)
    }

    /// The single line message as an escaped string literal.
    ///
    /// ```
    /// # use std::{io, sync::Arc};
    /// # use errmerge::{merge, MultiError, SharedError};
    /// let errs: [SharedError; 2] = [
    ///     Arc::new(io::Error::other("bad \"name\"")),
    ///     Arc::new(io::Error::other("bad size")),
    /// ];
    /// let err = merge(errs).unwrap_err();
    /// let multi = err.downcast_ref::<MultiError>().unwrap();
    ///
    /// assert_eq!(multi.quoted(), r#""2 errors: bad \"name\"; bad size""#);
    /// ```
    pub fn quoted(&self) -> String {
        self.render(RenderMode::Quoted)
    }

    /// Renders the message in the given [`RenderMode`], the way `{}`, `{:?}` of the message, or
    /// `{:#}` would.
    pub fn render(&self, mode: RenderMode) -> String {
        match mode {
            RenderMode::Plain => self.to_string(),
            RenderMode::Quoted => format!("{:?}", self.to_string()),
            RenderMode::Expanded => format!("{self:#}"),
        }
    }
}

fn noun(count: usize) -> &'static str {
    if count == 1 {
        "error"
    } else {
        "errors"
    }
}

impl fmt::Display for MultiError {
    /// Writes the single line message, or the expanded message if the alternate flag (`{:#}`) is
    /// set.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str(EMPTY_MESSAGE);
        }

        let count = self.errors.len();
        if f.alternate() {
            writeln!(f, "{} {}:", count, noun(count))?;
            for (i, error) in self.errors.iter().enumerate() {
                writeln!(f, "\terror {}: {}", i + 1, error)?;
            }
        } else {
            write!(f, "{} {}: ", count, noun(count))?;
            for (i, error) in self.errors.iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{}", error)?;
            }
        }
        Ok(())
    }
}

// No `source`, so chain walks stop at the aggregate.
impl Error for MultiError {}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a SharedError;
    type IntoIter = std::slice::Iter<'a, SharedError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl IntoIterator for MultiError {
    type Item = SharedError;
    type IntoIter = std::vec::IntoIter<SharedError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
