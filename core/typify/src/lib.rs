//! Typify Crate
//!
//! The type phases of the Pkl compiler, over the AST produced by
//! `pkl_ast`:
//!
//! 1. **typify1** annotates every expression node with its type, checking
//!    the typing rules of each construct along the way. `isa` expressions
//!    whose outcome is statically known are folded to literals.
//! 2. **typify2** determines which types are *complete* (size in bits
//!    known at compile time, constant) and annotates the type nodes. Not
//!    being complete is legal, but some operations later refuse incomplete
//!    operands.
//!
//! Both phases share a [`Payload`] collecting diagnostics; a phase fails
//! iff it reported at least one, and a failed phase skips the ones after
//! it. Errors abandon the offending subtree but the traversal continues,
//! so one run surfaces as many diagnostics as possible.
//!
//! ## Entry point
//!
//! ```ignore
//! let arena = parse_source(source_code);
//! let typed_context = TypifyBuilder::build_typed_context(arena)?.typed_context();
//! ```
//!
//! ## Modules
//!
//! - [`errors`] - Diagnostics with source locations
//! - [`typed_context`] - Per-node type attribute storage

use std::marker::PhantomData;

use anyhow::bail;
use pkl_ast::arena::Arena;

use crate::{errors::TypifyError, typed_context::TypedContext, typify1::Typify1, typify2::Typify2};

pub mod errors;
pub mod typed_context;
mod typify1;
mod typify2;

/// State shared by both phases: the diagnostics collected so far. A phase
/// fails iff this is non-empty at its end.
#[derive(Default)]
pub struct Payload {
    errors: Vec<TypifyError>,
}

impl Payload {
    #[must_use]
    pub fn errors(&self) -> &[TypifyError] {
        &self.errors
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub(crate) fn report(&mut self, error: TypifyError) {
        self.errors.push(error);
    }
}

/// Marker state indicating the builder has not run the phases yet.
pub struct TypifyInitState;

/// Marker state indicating both phases completed without diagnostics.
pub struct TypifyCompleteState;

/// Type alias for a completed builder ready to yield its context.
pub type CompletedTypifyBuilder = TypifyBuilder<TypifyCompleteState>;

/// Builder for running the type phases on an AST arena.
///
/// Uses the typestate pattern so the typed context can only be extracted
/// after both phases succeeded.
pub struct TypifyBuilder<S> {
    typed_context: TypedContext,
    _state: PhantomData<S>,
}

impl Default for TypifyBuilder<TypifyInitState> {
    fn default() -> Self {
        TypifyBuilder::new()
    }
}

impl TypifyBuilder<TypifyInitState> {
    #[must_use]
    pub fn new() -> Self {
        TypifyBuilder {
            typed_context: TypedContext::default(),
            _state: PhantomData,
        }
    }

    /// Run both type phases on the provided arena.
    ///
    /// # Errors
    ///
    /// Returns an error joining every diagnostic the failing phase
    /// collected. The second phase does not run if the first failed.
    #[must_use = "returns builder with typed context, extract with .typed_context()"]
    pub fn build_typed_context(
        arena: Arena,
    ) -> anyhow::Result<TypifyBuilder<TypifyCompleteState>> {
        let mut ctx = TypedContext::new(arena);
        let mut payload = Payload::default();

        Typify1::new(&mut payload).run(&mut ctx);
        Self::bail_on_errors(&payload)?;

        Typify2::new(&mut payload).run(&mut ctx);
        Self::bail_on_errors(&payload)?;

        debug_assert!(
            {
                let untyped = ctx.find_untyped_expressions();
                if !untyped.is_empty() {
                    eprintln!(
                        "typify bug: {} expression(s) without a type:",
                        untyped.len()
                    );
                    for missing in &untyped {
                        eprintln!(
                            "  - {} at {} (id: {})",
                            missing.kind, missing.location, missing.id
                        );
                    }
                }
                untyped.is_empty()
            },
            "every expression should have a type after typify1"
        );

        Ok(TypifyBuilder {
            typed_context: ctx,
            _state: PhantomData,
        })
    }

    fn bail_on_errors(payload: &Payload) -> anyhow::Result<()> {
        if payload.has_errors() {
            let messages: Vec<String> = payload
                .errors()
                .iter()
                .map(ToString::to_string)
                .collect();
            bail!(messages.join("; "));
        }
        Ok(())
    }
}

impl TypifyBuilder<TypifyCompleteState> {
    /// Consume the builder and return the typed context.
    #[must_use = "consumes builder and returns the typed context"]
    pub fn typed_context(self) -> TypedContext {
        self.typed_context
    }
}
