/// Services provided by the window/page hosting a document.
pub trait ShellProvider {
    fn request_redraw(&self) {}

    /// Show a simple message to the user.
    fn alert(&self, message: &str) {
        let _ = message;
    }

    /// Ask the user a yes/no question. Hosts without a UI answer "no".
    fn confirm(&self, message: &str) -> bool {
        let _ = message;
        false
    }
}

pub struct DummyShellProvider;
impl ShellProvider for DummyShellProvider {}
