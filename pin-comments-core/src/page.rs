//! Page scope: which comments belong to the current location, plus the
//! transient interaction state that is discarded whenever the location changes.
//!
//! The host reports navigation through [`PageScope::location_changed`]
//! (router event, history change). Nothing here polls.

use crate::types::{Comment, Position};

/// Interaction state that only makes sense on the page where it started.
///
/// Reset on every distinct navigation; never touches the comment set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interaction {
    /// Comment mode is on: clicks place pins.
    pub active: bool,
    /// Pin placed but not yet confirmed with text.
    pub pending: Option<Position>,
    /// Comment whose thread is open.
    pub selected: Option<String>,
    /// Side panel listing the page's comments is open.
    pub panel_open: bool,
}

impl Interaction {
    /// Leaves comment mode. Pending placement and selection go with it.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.pending = None;
        self.selected = None;
    }
}

/// Current location plus its transient interaction state.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScope {
    current: String,
    interaction: Interaction,
    /// Pins drawn on the page. A viewer preference, so navigation keeps it.
    pins_visible: bool,
}

impl PageScope {
    pub fn new(path: impl Into<String>) -> Self {
        Self { current: path.into(), interaction: Interaction::default(), pins_visible: true }
    }

    pub fn pins_visible(&self) -> bool {
        self.pins_visible
    }

    pub fn set_pins_visible(&mut self, visible: bool) {
        self.pins_visible = visible;
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut Interaction {
        &mut self.interaction
    }

    /// Records a navigation to `path`.
    ///
    /// Returns `true` and resets the interaction state when the path differs
    /// from the current one; a same-path notification is ignored.
    pub fn location_changed(&mut self, path: &str) -> bool {
        if path == self.current {
            return false;
        }
        self.current = path.to_owned();
        self.interaction = Interaction::default();
        true
    }
}

/// Comments whose page is exactly `page`, in set order.
pub fn comments_on_page<'a>(comments: &'a [Comment], page: &str) -> Vec<&'a Comment> {
    comments.iter().filter(|c| c.page == page).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, page: &str) -> Comment {
        Comment {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            text: id.into(),
            timestamp: String::new(),
            page: page.into(),
            author: None,
            replies: Vec::new(),
            created_at: None,
        }
    }

    #[test]
    fn filter_is_exact_match() {
        let all = vec![comment("1", "/a"), comment("2", "/a/"), comment("3", "/A"), comment("4", "/a")];
        let ids: Vec<_> = comments_on_page(&all, "/a").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["1", "4"]);
    }

    #[test]
    fn refiltering_is_deterministic() {
        let all = vec![comment("1", "/a"), comment("2", "/b")];
        let before = all.clone();
        let first = comments_on_page(&all, "/b");
        let _ = comments_on_page(&all, "/a");
        let again = comments_on_page(&all, "/b");
        assert_eq!(first, again);
        assert_eq!(all, before);
    }

    #[test]
    fn navigation_resets_interaction_once() {
        let mut scope = PageScope::new("/a");
        let i = scope.interaction_mut();
        i.active = true;
        i.panel_open = true;
        i.pending = Some(Position { x: 1.0, y: 2.0 });
        i.selected = Some("c".into());

        assert!(!scope.location_changed("/a"), "same path is not a change");
        assert!(scope.interaction().active);

        assert!(scope.location_changed("/b"));
        assert_eq!(scope.interaction(), &Interaction::default());
        assert_eq!(scope.current(), "/b");
        assert!(!scope.location_changed("/b"));
    }

    #[test]
    fn hidden_pins_stay_hidden_across_navigation() {
        let mut scope = PageScope::new("/a");
        assert!(scope.pins_visible());
        scope.set_pins_visible(false);
        scope.interaction_mut().active = true;

        assert!(scope.location_changed("/b"));
        assert!(!scope.interaction().active);
        assert!(!scope.pins_visible());
    }

    #[test]
    fn deactivate_keeps_panel() {
        let mut i = Interaction {
            active: true,
            pending: Some(Position { x: 0.0, y: 0.0 }),
            selected: Some("x".into()),
            panel_open: true,
        };
        i.deactivate();
        assert!(!i.active && i.pending.is_none() && i.selected.is_none());
        assert!(i.panel_open);
    }
}
