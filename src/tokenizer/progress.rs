// src/tokenizer/progress.rs
//
// Progress reporting for long training runs. With the `progressbar` feature
// this is indicatif; without it every call is a no-op.

#[cfg(feature = "progressbar")]
pub use indicatif::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progressbar"))]
pub use shim::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progressbar"))]
mod shim {
    use std::borrow::Cow;

    pub struct ProgressBar;

    impl ProgressBar {
        pub fn new(_length: u64) -> Self {
            Self
        }

        pub fn set_length(&self, _length: u64) {}
        pub fn set_message(&self, _message: impl Into<Cow<'static, str>>) {}
        pub fn set_position(&self, _pos: u64) {}
        pub fn set_style(&self, _style: ProgressStyle) {}
        pub fn inc(&self, _delta: u64) {}
        pub fn reset(&self) {}
        pub fn finish(&self) {}
    }

    pub struct ProgressStyle;

    impl ProgressStyle {
        pub fn default_bar() -> Self {
            Self
        }

        pub fn template(self, _template: &str) -> Result<Self, String> {
            Ok(self)
        }
    }
}

/// Template shared by every training stage.
pub(crate) const TEMPLATE: &str = "[{elapsed_precise}] {msg:<30!} {wide_bar} {pos:>9!}/{len:<9!}";

/// Builds a styled bar, or `None` when progress display is off.
pub(crate) fn setup(show: bool) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let p = ProgressBar::new(0);
    match ProgressStyle::default_bar().template(TEMPLATE) {
        Ok(style) => p.set_style(style),
        Err(e) => log::warn!("progress template rejected: {e}"),
    }
    Some(p)
}

pub(crate) fn update(p: &Option<ProgressBar>, len: usize, message: &'static str) {
    if let Some(p) = p {
        p.set_message(message);
        p.set_length(len as u64);
        p.reset();
    }
}

pub(crate) fn finalize(p: &Option<ProgressBar>, final_len: usize) {
    if let Some(p) = p {
        p.set_length(final_len as u64);
        p.finish();
    }
}
