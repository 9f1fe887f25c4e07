// src/tokenizer/parallelism.rs
//
// Iterators that run on rayon when parallelism is enabled and fall back to
// plain std iterators otherwise. Callers only ever reduce commutative
// results through these, so both paths produce identical output.

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon_cond::CondIterator;

/// Environment variable that disables parallel pair counting process-wide.
pub const ENV_VARIABLE: &str = "CODEBPE_PARALLELISM";

/// Whether parallelism is allowed by the environment.
pub fn get_parallelism() -> bool {
    match std::env::var(ENV_VARIABLE) {
        Ok(value) => parse_parallelism(&value),
        Err(_) => true,
    }
}

/// Anything other than `false`, `off`, `no` or `0` (any case, surrounding
/// whitespace ignored) leaves parallelism enabled.
pub fn parse_parallelism(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "off" | "no" | "0"
    )
}

pub trait MaybeParallelIterator<P, S>
where
    P: ParallelIterator,
    S: Iterator<Item = P::Item>,
{
    /// Parallel only if `cond` holds and the environment allows it.
    fn into_maybe_par_iter_cond(self, cond: bool) -> CondIterator<P, S>;
}

impl<P, S, I> MaybeParallelIterator<P, S> for I
where
    I: IntoParallelIterator<Iter = P, Item = P::Item> + IntoIterator<IntoIter = S, Item = S::Item>,
    P: ParallelIterator,
    S: Iterator<Item = P::Item>,
{
    fn into_maybe_par_iter_cond(self, cond: bool) -> CondIterator<P, S> {
        CondIterator::new(self, cond && get_parallelism())
    }
}

pub trait MaybeParallelRefIterator<'data, P, S>
where
    P: ParallelIterator,
    S: Iterator<Item = P::Item>,
    P::Item: 'data,
{
    fn maybe_par_iter_cond(&'data self, cond: bool) -> CondIterator<P, S>;
}

impl<'data, P, S, I: 'data + ?Sized> MaybeParallelRefIterator<'data, P, S> for I
where
    &'data I: MaybeParallelIterator<P, S>,
    P: ParallelIterator,
    S: Iterator<Item = P::Item>,
    P::Item: 'data,
{
    fn maybe_par_iter_cond(&'data self, cond: bool) -> CondIterator<P, S> {
        self.into_maybe_par_iter_cond(cond)
    }
}
