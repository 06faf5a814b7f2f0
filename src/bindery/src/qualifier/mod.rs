mod filter;

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::injection::Managed;
use crate::structure::MetaInfo;

pub use filter::{QualifiedIter, QualifiedServices, QualifierError};

/// A service as seen by qualifiers.
///
/// While binding, live state is unknown and [`is_active`] and
/// [`is_available`] return [`None`]. At runtime they always return a value.
///
/// [`is_active`]: ServiceCandidate::is_active
/// [`is_available`]: ServiceCandidate::is_available
pub trait ServiceCandidate {
    fn identity(&self) -> &str;

    fn tags(&self) -> &[String];

    fn meta_info(&self) -> &MetaInfo;

    fn is_active(&self) -> Option<bool>;

    fn is_available(&self) -> Option<bool>;

    fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }
}

impl<T> ServiceCandidate for &T
where
    T: ServiceCandidate + ?Sized,
{
    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn tags(&self) -> &[String] {
        (**self).tags()
    }

    fn meta_info(&self) -> &MetaInfo {
        (**self).meta_info()
    }

    fn is_active(&self) -> Option<bool> {
        (**self).is_active()
    }

    fn is_available(&self) -> Option<bool> {
        (**self).is_available()
    }
}

/// A predicate narrowing the candidates of a service dependency.
#[derive(Debug, Clone)]
pub enum ServiceQualifier {
    WithId(String),
    WithMeta(Arc<dyn MetaMatcher>),
    Active,
    Available,
    WithTags(Vec<String>),
    First,
    Not(Box<ServiceQualifier>),
    FirstOf(Vec<ServiceQualifier>),
    And(Vec<ServiceQualifier>),
}

impl ServiceQualifier {
    /// Decides whether `candidate`, one of `source`, is accepted.
    ///
    /// The answer is three-valued: `None` means it depends on live state that
    /// is not known yet.
    pub fn qualifies<C: ServiceCandidate>(&self, candidate: &C, source: &[C]) -> Option<bool> {
        match self {
            Self::WithId(id) => Some(candidate.identity() == id),
            Self::WithMeta(matcher) => Some(matcher.matches(candidate.meta_info())),
            Self::Active => candidate.is_active(),
            Self::Available => candidate.is_available(),
            Self::WithTags(tags) => Some(tags.iter().all(|tag| candidate.has_tag(tag))),
            Self::First => Some(true),
            Self::Not(inner) => inner.qualifies(candidate, source).map(|accepted| !accepted),
            Self::And(qualifiers) => {
                let mut verdict = Some(true);
                for qualifier in qualifiers {
                    match qualifier.qualifies(candidate, source) {
                        Some(false) => return Some(false),
                        None => verdict = None,
                        Some(true) => {}
                    }
                }
                verdict
            }
            Self::FirstOf(branches) => Self::first_of_qualifies(branches, candidate, source),
        }
    }

    // The first branch accepting any candidate of `source` decides. Unknown
    // verdicts in earlier branches make later decisions unknown as well.
    fn first_of_qualifies<C: ServiceCandidate>(
        branches: &[ServiceQualifier],
        candidate: &C,
        source: &[C],
    ) -> Option<bool> {
        let mut uncertain = false;
        let mut unknown_here = false;

        for branch in branches {
            let verdict = branch.qualifies(candidate, source);
            let verdicts: Vec<_> = source.iter().map(|c| branch.qualifies(c, source)).collect();

            if verdicts.contains(&Some(true)) {
                return if !uncertain {
                    verdict
                } else if verdict == Some(true) || unknown_here {
                    None
                } else {
                    Some(false)
                };
            }
            uncertain |= verdicts.contains(&None);
            unknown_here |= verdict.is_none();
        }

        if unknown_here {
            None
        } else {
            Some(false)
        }
    }

    /// Returns true if the verdict may change once live state is known.
    pub fn depends_on_live_state(&self) -> bool {
        match self {
            Self::Active | Self::Available => true,
            Self::Not(inner) => inner.depends_on_live_state(),
            Self::FirstOf(qualifiers) | Self::And(qualifiers) => {
                qualifiers.iter().any(Self::depends_on_live_state)
            }
            _ => false,
        }
    }
}

impl Display for ServiceQualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::WithId(id) => write!(f, "with_id({id:?})"),
            Self::WithMeta(matcher) => write!(f, "with_meta({matcher:?})"),
            Self::Active => write!(f, "where_active()"),
            Self::Available => write!(f, "where_available()"),
            Self::WithTags(tags) => write!(f, "with_tags({tags:?})"),
            Self::First => write!(f, "first()"),
            Self::Not(inner) => write!(f, "not({inner})"),
            Self::FirstOf(qualifiers) => write_list(f, "first_of", qualifiers),
            Self::And(qualifiers) => write_list(f, "and", qualifiers),
        }
    }
}

fn write_list(f: &mut Formatter<'_>, name: &str, qualifiers: &[ServiceQualifier]) -> FmtResult {
    write!(f, "{name}(")?;
    for (i, qualifier) in qualifiers.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{qualifier}")?;
    }
    write!(f, ")")
}

/// Matches the meta-info of a service.
pub trait MetaMatcher: Debug + Send + Sync + 'static {
    fn matches(&self, meta: &MetaInfo) -> bool;
}

#[derive(Debug)]
struct MetaEquals<T>(T);

impl<T> MetaMatcher for MetaEquals<T>
where
    T: Managed + PartialEq + Debug,
{
    fn matches(&self, meta: &MetaInfo) -> bool {
        meta.get_ref::<T>().is_some_and(|value| value == &self.0)
    }
}

pub fn with_id(id: impl Into<String>) -> ServiceQualifier {
    ServiceQualifier::WithId(id.into())
}

/// Accepts services carrying a meta-info value equal to `value`.
pub fn with_meta<T>(value: T) -> ServiceQualifier
where
    T: Managed + PartialEq + Debug,
{
    ServiceQualifier::WithMeta(Arc::new(MetaEquals(value)))
}

pub fn where_active() -> ServiceQualifier {
    ServiceQualifier::Active
}

pub fn where_available() -> ServiceQualifier {
    ServiceQualifier::Available
}

/// Accepts services carrying every one of `tags`.
pub fn with_tags<I, S>(tags: I) -> ServiceQualifier
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ServiceQualifier::WithTags(tags.into_iter().map(Into::into).collect())
}

pub fn first() -> ServiceQualifier {
    ServiceQualifier::First
}

pub fn not(qualifier: ServiceQualifier) -> ServiceQualifier {
    ServiceQualifier::Not(Box::new(qualifier))
}

/// Tries `qualifiers` in order. The first one that accepts at least one
/// service decides which services are accepted.
pub fn first_of<I>(qualifiers: I) -> ServiceQualifier
where
    I: IntoIterator<Item = ServiceQualifier>,
{
    ServiceQualifier::FirstOf(qualifiers.into_iter().collect())
}

pub fn and<I>(qualifiers: I) -> ServiceQualifier
where
    I: IntoIterator<Item = ServiceQualifier>,
{
    ServiceQualifier::And(qualifiers.into_iter().collect())
}
