use std::iter::FusedIterator;

use snafu::prelude::*;

use crate::qualifier::{ServiceCandidate, ServiceQualifier};

/// The services of `source` accepted by an optional qualifier, in source
/// order.
///
/// Every call to [`QualifiedServices::iter`] starts over from the beginning
/// of the source.
#[derive(Debug)]
pub struct QualifiedServices<'a, C> {
    source: &'a [C],
    qualifier: Option<&'a ServiceQualifier>,
}

impl<'a, C> QualifiedServices<'a, C>
where
    C: ServiceCandidate,
{
    pub fn new(source: &'a [C], qualifier: Option<&'a ServiceQualifier>) -> Self {
        Self { source, qualifier }
    }

    /// Services definitely accepted.
    pub fn iter(&self) -> QualifiedIter<'a, C> {
        QualifiedIter::new(self.source, self.qualifier, Mode::Accepted)
    }

    /// Services not definitely rejected, i.e. accepted or depending on live
    /// state that is unknown yet.
    pub fn possible(&self) -> QualifiedIter<'a, C> {
        QualifiedIter::new(self.source, self.qualifier, Mode::Possible)
    }

    pub fn first(&self) -> Option<&'a C> {
        self.iter().next()
    }
}

impl<'a, C> IntoIterator for &QualifiedServices<'a, C>
where
    C: ServiceCandidate,
{
    type Item = &'a C;
    type IntoIter = QualifiedIter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Accepted,
    Possible,
}

/// A forward-only pass over qualified services.
///
/// Once exhausted it keeps returning [`None`]. Use [`QualifiedIter::try_next`]
/// to treat running past the end as an error instead.
#[derive(Debug)]
pub struct QualifiedIter<'a, C> {
    source: &'a [C],
    qualifier: Option<&'a ServiceQualifier>,
    mode: Mode,
    position: usize,
}

impl<'a, C> QualifiedIter<'a, C>
where
    C: ServiceCandidate,
{
    fn new(source: &'a [C], qualifier: Option<&'a ServiceQualifier>, mode: Mode) -> Self {
        Self {
            source,
            qualifier,
            mode,
            position: 0,
        }
    }

    /// Like [`Iterator::next`], but fails once the sequence is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`QualifierError::Exhausted`] if no further service is
    /// accepted.
    pub fn try_next(&mut self) -> Result<&'a C, QualifierError> {
        let consumed = self.position;
        self.next().context(ExhaustedSnafu { consumed })
    }

    fn accepts(&self, candidate: &C) -> bool {
        let verdict = match self.qualifier {
            Some(qualifier) => qualifier.qualifies(candidate, self.source),
            None => Some(true),
        };
        match self.mode {
            Mode::Accepted => verdict == Some(true),
            Mode::Possible => verdict != Some(false),
        }
    }
}

impl<'a, C> Iterator for QualifiedIter<'a, C>
where
    C: ServiceCandidate,
{
    type Item = &'a C;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(candidate) = self.source.get(self.position) {
            self.position += 1;
            if self.accepts(candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

impl<C> FusedIterator for QualifiedIter<'_, C> where C: ServiceCandidate {}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[non_exhaustive]
pub enum QualifierError {
    #[snafu(display("no further service is accepted after visiting {consumed} candidates"))]
    #[non_exhaustive]
    Exhausted { consumed: usize },
}
