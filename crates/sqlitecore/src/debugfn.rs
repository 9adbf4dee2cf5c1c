use std::fmt;

/// Wraps a value that has no `Debug` impl of its own (typically a closure)
/// so it can sit inside a struct that derives or implements `Debug`.
pub(crate) struct DebugFn<F: ?Sized>(pub(crate) F);

impl<F: ?Sized> fmt::Debug for DebugFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<function>")
    }
}
