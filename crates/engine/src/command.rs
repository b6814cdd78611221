use tenantgate_core::EngineResult;

use crate::context::CommandContext;

/// A unit of engine work executed inside a [`CommandContext`].
///
/// A command issued through the [`CommandExecutor`](crate::CommandExecutor)
/// is *top-level* and gets a fresh context; a command executed from another
/// command's body via [`CommandContext::execute`] is *nested* and shares the
/// caller's context, including its tenant-check toggle and staged writes.
pub trait Command: core::fmt::Debug {
    type Output;

    /// Name used in tracing spans.
    const NAME: &'static str;

    fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<Self::Output>;
}
