use crate::Error;

/// The host side of a [`Module`](crate::Module): receives whatever the module wants to display.
pub trait Sink<O> {
    /// Show the given output, replacing whatever was shown before. `None` means "show nothing".
    fn push_output(&mut self, output: Option<O>);

    /// Show an error. Returns `true` if the host is done and the module should stop producing output.
    fn push_error(&mut self, error: Error) -> bool;
}

impl<O, S: Sink<O> + ?Sized> Sink<O> for &mut S {
    fn push_output(&mut self, output: Option<O>) {
        (**self).push_output(output)
    }

    fn push_error(&mut self, error: Error) -> bool {
        (**self).push_error(error)
    }
}
