use crate::{Rect, Size};

/// Decides when to raise `on_load_more`.
///
/// `guard` is set when a request is raised and cleared only by `set_loading(false)`, so a request
/// fires once per threshold crossing.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct LoadMore {
    guard: bool,
    recheck: bool,
    last_content_height: f64,
}

impl LoadMore {
    pub(crate) fn is_guarded(&self) -> bool {
        self.guard
    }

    pub(crate) fn set_loading(&mut self, is_loading: bool) {
        if self.guard && !is_loading {
            self.recheck = true;
        }
        self.guard = is_loading;
    }

    /// Scroll-driven check: fires when the visible rect is within `threshold` viewport heights of
    /// the end of the content.
    pub(crate) fn check_scroll(&mut self, rect: Rect, content: Size, threshold: f64) -> bool {
        if self.guard {
            return false;
        }
        if rect.y > content.height - threshold * rect.height {
            self.guard = true;
            return true;
        }
        false
    }

    /// Layout-driven check: fires when the content does not fill the viewport, after the content
    /// height changed or loading finished.
    pub(crate) fn check_content_fit(&mut self, viewport: Size, content: Size) -> bool {
        let changed = content.height != self.last_content_height;
        self.last_content_height = content.height;
        let recheck = core::mem::take(&mut self.recheck);
        if self.guard {
            return false;
        }
        if content.height > 0.0 && content.height <= viewport.height && (changed || recheck) {
            self.guard = true;
            return true;
        }
        false
    }
}
