//! Overlay confinement onto a provider surface.

use std::io;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::jail::Jail;
use crate::ops::{self, OperationClass, Strategy};
use crate::surface::{sync_name, Operation, Surface, PROMISES};
use crate::value::{Args, FsValue};

/// Build a surface shaped exactly like `provider` whose path-taking
/// operations confine their path arguments to `jail`.
///
/// Every classified operation is replaced in its callback form, its `_sync`
/// form, and its form inside the `promises` namespace, wherever the provider
/// has them. Operations the provider lacks are skipped. All other members
/// are shared with `provider` by reference.
pub fn bind_surface(provider: &Surface, jail: &Jail) -> Surface {
    let jail = Arc::new(jail.clone());
    let mut bound = provider.clone();
    let mut wrapped = 0;

    for (name, class) in ops::classified() {
        wrapped += wrap(&mut bound, name, name, class, &jail);
        if class.has_sync {
            wrapped += wrap(&mut bound, &sync_name(name), name, class, &jail);
        }
        if let Some(promises) = bound.namespace_mut(PROMISES) {
            wrapped += wrap(promises, name, name, class, &jail);
        }
    }

    debug!(
        root = %jail.root_str(),
        allow_temp = jail.allows_temp(),
        wrapped,
        "Bound confined surface"
    );
    bound
}

fn wrap(
    surface: &mut Surface,
    member: &str,
    operation: &'static str,
    class: &OperationClass,
    jail: &Arc<Jail>,
) -> usize {
    let Some(original) = surface.operation(member) else {
        trace!(member, "Provider has no such operation, skipping");
        return 0;
    };

    let mut confined = Operation::new(
        original
            .call
            .rewritten(rewriter(Arc::clone(jail), operation, class.strategy)),
    );
    // A native variant is never left unconfined.
    if let Some(native) = &original.native {
        confined = confined.with_native(native.rewritten(rewriter(Arc::clone(jail), operation, class.strategy)));
    }

    surface.insert(member, confined);
    1
}

fn rewriter(
    jail: Arc<Jail>,
    operation: &'static str,
    strategy: Strategy,
) -> impl Fn(Args) -> io::Result<Args> + Send + Sync + 'static {
    move |mut args: Args| {
        for (index, accepts) in strategy.positions().iter().enumerate() {
            let Some(slot) = args.get_mut(index) else {
                break;
            };
            let candidate = std::mem::replace(slot, FsValue::Unit);
            *slot = jail.confine_arg(operation, index + 1, candidate, *accepts)?;
        }
        Ok(args)
    }
}
