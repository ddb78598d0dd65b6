//! Analysis sessions: the scope of cached results.
//!
//! A session is created for one run over a repository, shared between the
//! threads that analyze its methods, and dropped with every cached result
//! at the end of the run.

use crate::cache::ResultCache;
use crate::cancel::CancellationToken;
use crate::config::{AnalysisConfig, AnalysisKind, InterproceduralAnalysisKind};
use crate::controlflow::Cfg;
use crate::copy::CopyResult;
use crate::dispose::DisposeResult;
use crate::entity::{AbstractLocation, CreationSite, Frame};
use crate::errors::AnalysisResult;
use crate::interprocedural::{resolve_call, CallOutcome, InterproceduralContext};
use crate::null::NullResult;
use crate::param_validation::ParameterValidationResult;
use crate::points_to::PointsToResult;
use crate::repo::{Method, MethodUid, Repo};
use crate::value_content::ValueContentResult;
use fw_model::operations::MethodRef;
use fw_model::OperationId;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Results of a followed invocation: the callee result of the requesting
/// analysis kind and the callee points-to result in the same context.
pub struct CalleeResults<A> {
    pub result: Arc<A>,
    pub points_to: Arc<PointsToResult>,
}

/// Everything a cached result depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalysisKey<E> {
    pub method: MethodUid,
    pub kind: AnalysisKind,
    pub config: Arc<AnalysisConfig>,
    pub context: InterproceduralContext,
    /// Initial knowledge about arguments, for context-sensitive analyses.
    pub entry: E,
}

/// An analysis kind, as seen by the session.
pub trait Analysis: Sized + Send + Sync + 'static {
    const KIND: AnalysisKind;

    /// Initial knowledge the analysis can be given about its arguments.
    type Entry: Clone + Eq + Hash + Default + fmt::Debug + Send + Sync;

    fn cache(caches: &SessionCaches) -> &ResultCache<AnalysisKey<Self::Entry>, Self>;

    /// Runs the analysis on the context method.
    ///
    /// # Errors
    ///
    /// Returns an error on cancellation or if the method cannot be analyzed.
    fn compute(ctx: &AnalysisContext<'_, '_>, entry: &Self::Entry) -> AnalysisResult<Self>;

    /// The frame this result was computed in.
    fn frame(&self) -> Frame;
}

/// One result cache per analysis kind.
#[derive(Default)]
pub struct SessionCaches {
    pub(crate) points_to: ResultCache<AnalysisKey<()>, PointsToResult>,
    pub(crate) copy: ResultCache<AnalysisKey<()>, CopyResult>,
    pub(crate) value_content:
        ResultCache<AnalysisKey<<ValueContentResult as Analysis>::Entry>, ValueContentResult>,
    pub(crate) null: ResultCache<AnalysisKey<<NullResult as Analysis>::Entry>, NullResult>,
    pub(crate) dispose: ResultCache<AnalysisKey<()>, DisposeResult>,
    pub(crate) param_validation: ResultCache<AnalysisKey<()>, ParameterValidationResult>,
}

/// Cache counters of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub computations: usize,
    pub hits: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} analyses computed, {} cache hits",
            self.computations, self.hits
        )
    }
}

pub struct AnalysisSession<'a> {
    repo: &'a Repo<'a>,
    config: Arc<AnalysisConfig>,
    cancel: CancellationToken,
    cfgs: ResultCache<MethodUid, Cfg<'a>>,
    caches: SessionCaches,
}

impl<'a> AnalysisSession<'a> {
    #[must_use]
    pub fn new(repo: &'a Repo<'a>, config: AnalysisConfig) -> Self {
        Self::with_cancellation(repo, config, CancellationToken::new())
    }

    #[must_use]
    pub fn with_cancellation(
        repo: &'a Repo<'a>,
        config: AnalysisConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repo,
            config: Arc::new(config),
            cancel,
            cfgs: ResultCache::new(),
            caches: SessionCaches::default(),
        }
    }

    #[inline]
    pub fn repo(&self) -> &'a Repo<'a> {
        self.repo
    }

    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[inline]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the control flow graph of a method, built once per session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AnalysisError::NoCode`] for methods without body.
    pub fn cfg(&self, method: &Method<'a>) -> AnalysisResult<Arc<Cfg<'a>>> {
        self.cfgs
            .get_or_compute(method.uid(), || Cfg::for_method(method))
    }

    /// Analyzes a method on its own, without any knowledge about its
    /// arguments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AnalysisError::Cancelled`] if the session has been
    /// cancelled, or an error if the method cannot be analyzed.
    pub fn analyze<A: Analysis>(&self, method: &'a Method<'a>) -> AnalysisResult<Arc<A>> {
        self.analyze_in(method, InterproceduralContext::root(), A::Entry::default())
    }

    /// Analyzes a method in a given calling context.
    ///
    /// # Errors
    ///
    /// Same as [`AnalysisSession::analyze`].
    pub fn analyze_in<A: Analysis>(
        &self,
        method: &'a Method<'a>,
        context: InterproceduralContext,
        entry: A::Entry,
    ) -> AnalysisResult<Arc<A>> {
        self.cancel.check()?;
        log::debug!(
            "{} analysis of {} in context {}",
            A::KIND,
            method,
            context
        );

        let frame = Frame::new(method.uid(), context.depth());
        let build = || -> AnalysisResult<A> {
            let ctx = AnalysisContext {
                session: self,
                method,
                cfg: self.cfg(method)?,
                interprocedural: context.clone(),
            };
            A::compute(&ctx, &entry)
        };
        let key = AnalysisKey {
            method: method.uid(),
            kind: A::KIND,
            config: Arc::clone(&self.config),
            context: context.clone(),
            entry: entry.clone(),
        };

        let result = A::cache(&self.caches).get_or_compute(key, &build)?;
        if result.frame() != frame {
            debug_assert!(
                false,
                "cached {} result of {} belongs to frame {} instead of {}",
                A::KIND,
                method,
                result.frame(),
                frame
            );
            log::warn!(
                "inconsistent cached {} result for {}, recomputing",
                A::KIND,
                method
            );
            return build().map(Arc::new);
        }
        Ok(result)
    }

    /// Returns the cache counters summed over every analysis kind.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        let caches = &self.caches;
        let counters = [
            (caches.points_to.computations(), caches.points_to.hits()),
            (caches.copy.computations(), caches.copy.hits()),
            (
                caches.value_content.computations(),
                caches.value_content.hits(),
            ),
            (caches.null.computations(), caches.null.hits()),
            (caches.dispose.computations(), caches.dispose.hits()),
            (
                caches.param_validation.computations(),
                caches.param_validation.hits(),
            ),
        ];
        counters
            .into_iter()
            .fold(SessionStats::default(), |acc, (computations, hits)| {
                SessionStats {
                    computations: acc.computations + computations,
                    hits: acc.hits + hits,
                }
            })
    }

    /// Cache counters of a single analysis kind.
    #[must_use]
    pub fn stats_of<A: Analysis>(&self) -> SessionStats {
        let cache = A::cache(&self.caches);
        SessionStats {
            computations: cache.computations(),
            hits: cache.hits(),
        }
    }
}

/// Everything an analysis of one method in one calling context needs.
pub struct AnalysisContext<'s, 'a> {
    session: &'s AnalysisSession<'a>,
    method: &'a Method<'a>,
    cfg: Arc<Cfg<'a>>,
    interprocedural: InterproceduralContext,
}

impl<'s, 'a> AnalysisContext<'s, 'a> {
    #[inline]
    pub fn session(&self) -> &'s AnalysisSession<'a> {
        self.session
    }

    #[inline]
    pub fn repo(&self) -> &'a Repo<'a> {
        self.session.repo
    }

    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.session.config
    }

    #[inline]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.session.cancel
    }

    #[inline]
    pub fn method(&self) -> &'a Method<'a> {
        self.method
    }

    #[inline]
    pub fn cfg(&self) -> &Cfg<'a> {
        &self.cfg
    }

    #[inline]
    pub fn interprocedural(&self) -> &InterproceduralContext {
        &self.interprocedural
    }

    #[inline]
    pub fn frame(&self) -> Frame {
        Frame::new(self.method.uid(), self.interprocedural.depth())
    }

    /// The location of the object allocated by an operation of this frame.
    #[must_use]
    pub fn creation_location(&self, operation: OperationId) -> AbstractLocation {
        AbstractLocation::Creation(CreationSite {
            method: self.method.uid(),
            operation,
            context: self.interprocedural.call_stack().to_vec(),
        })
    }

    /// Decides whether an invocation at `operation` is followed.
    pub fn resolve_call(&self, operation: OperationId, callee: &MethodRef) -> CallOutcome<'a> {
        resolve_call(
            self.session.repo,
            &self.session.config,
            &self.interprocedural,
            self.method.uid(),
            operation,
            callee,
        )
    }

    /// Runs another analysis kind on the same method and context.
    ///
    /// # Errors
    ///
    /// Same as [`AnalysisSession::analyze`].
    pub fn prerequisite<A: Analysis>(&self) -> AnalysisResult<Arc<A>> {
        self.session
            .analyze_in(self.method, self.interprocedural.clone(), A::Entry::default())
    }

    /// Analyzes the callee of an invocation at `operation`, if the call can
    /// be followed. `None` means the call effects must be approximated.
    ///
    /// # Errors
    ///
    /// Only cancellation is reported. Callees that cannot be analyzed are
    /// logged and approximated.
    pub fn analyze_callee<A: Analysis>(
        &self,
        operation: OperationId,
        callee: &MethodRef,
        entry: A::Entry,
    ) -> AnalysisResult<Option<CalleeResults<A>>> {
        let CallOutcome::Analyze { callee: method, context } = self.resolve_call(operation, callee)
        else {
            return Ok(None);
        };
        let analyzed = self
            .session
            .analyze_in::<A>(method, context.clone(), entry)
            .and_then(|result| {
                let points_to = self.session.analyze_in::<PointsToResult>(method, context, ())?;
                Ok(CalleeResults { result, points_to })
            });
        match analyzed {
            Ok(results) => Ok(Some(results)),
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                log::warn!("cannot follow call to {method}: {err}");
                Ok(None)
            }
        }
    }

    /// Whether callees are given the caller's knowledge about arguments.
    pub fn is_context_sensitive(&self) -> bool {
        self.session.config.interprocedural == InterproceduralAnalysisKind::ContextSensitive
    }

    pub fn is_pessimistic(&self, kind: AnalysisKind) -> bool {
        self.session.config.is_pessimistic(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use fw_model::{BlockId, Program};

    fn caller_program() -> Program {
        program(vec![class(
            "C",
            &[],
            &[],
            vec![
                static_method("callee", &[], Some(straight(vec![ret(None)]))),
                static_method(
                    "m",
                    &[],
                    Some(straight(vec![
                        invoke(call("C", "callee", &[], None, vec![])),
                        ret(None),
                    ])),
                ),
            ],
        )])
    }

    #[test]
    fn cancellation_from_another_thread_aborts_the_run() {
        let program = caller_program();
        let repo = Repo::new(&program).unwrap();
        let token = CancellationToken::new();
        let session =
            AnalysisSession::with_cancellation(&repo, AnalysisConfig::default(), token.clone());
        let callee = find_method(&repo, "C", "callee");
        let m = find_method(&repo, "C", "m");

        assert!(session.analyze::<DisposeResult>(callee).is_ok());
        std::thread::scope(|s| {
            s.spawn(|| token.cancel());
        });
        let err = session.analyze::<DisposeResult>(m).err().unwrap();
        assert!(err.is_cancelled());
        // cached results are not handed out either
        let err = session.analyze::<DisposeResult>(callee).err().unwrap();
        assert!(err.is_cancelled());
    }

    #[test]
    fn cancelled_callees_are_not_approximated() {
        let program = caller_program();
        let repo = Repo::new(&program).unwrap();
        let session = AnalysisSession::new(&repo, AnalysisConfig::default());
        let m = find_method(&repo, "C", "m");
        let ctx = AnalysisContext {
            session: &session,
            method: m,
            cfg: session.cfg(m).unwrap(),
            interprocedural: InterproceduralContext::root(),
        };
        let call_site = OperationId::new(BlockId(1), 0);
        let callee = MethodRef::new("C", "callee", Vec::new());

        let followed = ctx
            .analyze_callee::<PointsToResult>(call_site, &callee, ())
            .unwrap();
        assert!(followed.is_some());

        session.cancellation().cancel();
        let err = ctx
            .analyze_callee::<PointsToResult>(call_site, &callee, ())
            .err()
            .unwrap();
        assert!(err.is_cancelled());
    }
}
