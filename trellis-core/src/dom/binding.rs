//! Node Bindings
//!
//! Effects that keep a node in sync with an expression. Each binding is
//! registered under its node in the [`NodeRegistry`], so tearing the node
//! down stops it.

use tracing::trace;

use crate::error::EffectOutput;
use crate::expr::{ExprCache, Scope};
use crate::reactive::{Disposer, Effect};

use super::{Dom, NodeRegistry};

/// Run `body` as an effect owned by `node`.
pub fn bind_effect<N, F, O>(registry: &NodeRegistry<N>, node: &N, body: F) -> Disposer
where
    N: Clone + Eq + std::hash::Hash + std::fmt::Debug + 'static,
    F: FnMut() -> O + 'static,
    O: EffectOutput,
{
    let disposer = Effect::new(body).disposer();
    registry.register(node, disposer.clone());
    disposer
}

/// Keep the text of `node` equal to `source` evaluated in `scope`.
///
/// The expression is compiled before the effect first runs. Nullish results
/// render as empty text.
pub fn bind_text<D: Dom>(
    dom: &D,
    registry: &NodeRegistry<D::Node>,
    cache: &ExprCache,
    node: &D::Node,
    source: &str,
    scope: &Scope,
) -> Disposer {
    let compiled = cache.compile(source);
    trace!(node = ?node, expression = %source, "binding text");

    let dom = dom.clone();
    let target = node.clone();
    let scope = scope.clone();
    bind_effect(registry, node, move || {
        let text = compiled.evaluate(&scope, true).to_text();
        dom.set_text(&target, &text);
    })
}
