//! Contracts with the camera-capture and code-rendering collaborators.

/// What the camera-capture side hands over for each frame it decodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A code was decoded to text. May repeat many times for one code.
    Decoded(String),
    /// Per-frame noise such as an out-of-focus frame. Never shown to the user.
    Transient(String),
    /// The camera cannot be used at all, e.g. permission denied.
    Fatal(String),
}

/// Displays a serialized payload as a scannable code.
pub trait CodeRenderer {
    fn render(&mut self, payload: &str);
}
