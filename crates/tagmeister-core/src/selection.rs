//! Multi-select model over the current directory listing
//!
//! `selected` keeps insertion order so that removing the primary image can fall
//! back to the most recently added remaining one.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;

/// Modifier keys held during a click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    pub ctrl: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionModel {
    ordered: Vec<PathBuf>,
    selected: IndexSet<PathBuf>,
    primary: Option<PathBuf>,
    anchor: Option<PathBuf>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing. The previous primary survives if it is still listed,
    /// otherwise the first image becomes the single selection.
    pub fn load(&mut self, ordered: Vec<PathBuf>) {
        let keep = self
            .primary
            .as_ref()
            .filter(|p| ordered.contains(p))
            .cloned();
        self.ordered = ordered;
        self.anchor = None;

        match keep.or_else(|| self.ordered.first().cloned()) {
            Some(path) => self.select_one(&path),
            None => self.clear(),
        }
    }

    pub fn ordered(&self) -> &[PathBuf] {
        &self.ordered
    }

    pub fn primary(&self) -> Option<&Path> {
        self.primary.as_deref()
    }

    pub fn anchor(&self) -> Option<&Path> {
        self.anchor.as_deref()
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        self.selected.contains(path)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected paths in listing order.
    pub fn selected_in_order(&self) -> Vec<PathBuf> {
        self.ordered
            .iter()
            .filter(|p| self.selected.contains(*p))
            .cloned()
            .collect()
    }

    pub fn select_one(&mut self, path: &Path) {
        self.selected.clear();
        self.selected.insert(path.to_path_buf());
        self.primary = Some(path.to_path_buf());
        self.anchor = Some(path.to_path_buf());
    }

    pub fn toggle(&mut self, path: &Path) {
        if self.selected.shift_remove(path) {
            self.primary = self.selected.last().cloned();
        } else {
            self.selected.insert(path.to_path_buf());
            self.primary = Some(path.to_path_buf());
        }
        self.anchor = Some(path.to_path_buf());
    }

    /// Select the inclusive listing range between the anchor and `path`.
    /// Returns false (and changes nothing) without an anchor or when either end is unlisted.
    pub fn select_range(&mut self, path: &Path, additive: bool) -> bool {
        let Some(anchor) = self.anchor.as_ref() else {
            return false;
        };
        let Some(from) = self.index_of(anchor) else {
            return false;
        };
        let Some(to) = self.index_of(path) else {
            return false;
        };

        let (start, end) = (from.min(to), from.max(to));
        if !additive {
            self.selected.clear();
        }
        for p in &self.ordered[start..=end] {
            self.selected.insert(p.clone());
        }
        self.primary = Some(path.to_path_buf());
        true
    }

    pub fn select_all(&mut self) {
        self.selected = self.ordered.iter().cloned().collect();
        self.primary = self.ordered.first().cloned();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.primary = None;
    }

    pub fn click(&mut self, path: &Path, modifiers: ClickModifiers) {
        match (modifiers.ctrl, modifiers.shift) {
            (false, false) => self.select_one(path),
            (true, false) => self.toggle(path),
            (additive, true) => {
                self.select_range(path, additive);
            }
        }
    }

    /// Make `path` the primary image, adding it to the selection if needed.
    pub fn focus(&mut self, path: &Path) {
        if !self.selected.contains(path) {
            self.selected.insert(path.to_path_buf());
        }
        self.primary = Some(path.to_path_buf());
    }

    /// Narrow the selection to `paths`; the first becomes primary.
    pub fn retain_only(&mut self, paths: &[PathBuf]) {
        self.selected = paths.iter().cloned().collect();
        self.primary = paths.first().cloned();
    }

    fn index_of(&self, path: &Path) -> Option<usize> {
        self.ordered.iter().position(|p| p == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<PathBuf> {
        ["a", "b", "c", "d", "e"].iter().map(PathBuf::from).collect()
    }

    fn model() -> SelectionModel {
        let mut m = SelectionModel::new();
        m.load(listing());
        m
    }

    fn p(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    fn primary_is_selected(m: &SelectionModel) -> bool {
        match m.primary() {
            Some(primary) => m.is_selected(primary),
            None => m.is_empty(),
        }
    }

    #[test]
    fn load_selects_first_image() {
        let m = model();
        assert_eq!(m.primary(), Some(Path::new("a")));
        assert_eq!(m.selected_in_order(), vec![p("a")]);
    }

    #[test]
    fn reload_keeps_surviving_primary() {
        let mut m = model();
        m.select_one(&p("c"));
        m.load(vec![p("c"), p("z")]);
        assert_eq!(m.primary(), Some(Path::new("c")));

        m.load(vec![p("x"), p("y")]);
        assert_eq!(m.primary(), Some(Path::new("x")));

        m.load(Vec::new());
        assert!(m.is_empty());
        assert_eq!(m.primary(), None);
    }

    #[test]
    fn range_from_anchor_is_inclusive() {
        let mut m = model();
        m.select_one(&p("c"));
        assert!(m.select_range(&p("a"), false));
        assert_eq!(m.selected_in_order(), vec![p("a"), p("b"), p("c")]);
        assert_eq!(m.anchor(), Some(Path::new("c")));
        assert_eq!(m.primary(), Some(Path::new("a")));
    }

    #[test]
    fn range_is_symmetric() {
        let mut forward = model();
        forward.select_one(&p("a"));
        forward.select_range(&p("c"), false);

        let mut backward = model();
        backward.select_one(&p("c"));
        backward.select_range(&p("a"), false);

        assert_eq!(forward.selected_in_order(), backward.selected_in_order());
    }

    #[test]
    fn additive_range_unions() {
        let mut m = model();
        m.select_one(&p("e"));
        m.toggle(&p("b"));
        m.select_range(&p("a"), true);
        assert_eq!(m.selected_in_order(), vec![p("a"), p("b"), p("e")]);
    }

    #[test]
    fn range_without_anchor_is_noop() {
        let mut m = SelectionModel::new();
        m.ordered = listing();
        assert!(!m.select_range(&p("c"), false));
        assert!(m.is_empty());
    }

    #[test]
    fn toggle_off_falls_back_to_latest_added() {
        let mut m = model();
        m.select_one(&p("a"));
        m.toggle(&p("d"));
        m.toggle(&p("b"));
        assert_eq!(m.primary(), Some(Path::new("b")));

        m.toggle(&p("b"));
        assert_eq!(m.primary(), Some(Path::new("d")));
        assert_eq!(m.anchor(), Some(Path::new("b")));

        m.toggle(&p("d"));
        m.toggle(&p("a"));
        assert!(m.is_empty());
        assert_eq!(m.primary(), None);
    }

    #[test]
    fn select_all_uses_listing_order() {
        let mut m = model();
        m.select_one(&p("d"));
        m.select_all();
        assert_eq!(m.len(), 5);
        assert_eq!(m.primary(), Some(Path::new("a")));
    }

    #[test]
    fn click_dispatch() {
        let mut m = model();
        m.click(&p("b"), ClickModifiers::default());
        m.click(&p("d"), ClickModifiers { ctrl: false, shift: true });
        assert_eq!(m.selected_in_order(), vec![p("b"), p("c"), p("d")]);

        m.click(&p("e"), ClickModifiers { ctrl: true, shift: false });
        assert_eq!(m.len(), 4);
        assert_eq!(m.anchor(), Some(Path::new("e")));
    }

    #[test]
    fn primary_stays_selected() {
        let mut m = model();
        let steps: Vec<Box<dyn Fn(&mut SelectionModel)>> = vec![
            Box::new(|m| m.select_one(&p("c"))),
            Box::new(|m| m.toggle(&p("e"))),
            Box::new(|m| {
                m.select_range(&p("a"), true);
            }),
            Box::new(|m| m.toggle(&p("a"))),
            Box::new(|m| m.select_all()),
            Box::new(|m| m.retain_only(&[p("d"), p("e")])),
            Box::new(|m| m.focus(&p("b"))),
            Box::new(|m| m.clear()),
        ];
        for step in steps {
            step(&mut m);
            assert!(primary_is_selected(&m));
        }
    }
}
