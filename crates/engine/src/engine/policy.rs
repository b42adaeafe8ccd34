//! Selection policies: how the engine picks one action among the candidates.

use crate::action::Action;

/// Chooses the next action to run.
///
/// `candidates` holds every registered action whose inputs are currently
/// available, in registration order. The policy returns the index of its
/// choice, or `None` when it cannot choose; the engine treats both `None` and
/// an out-of-range index as a fault.
pub trait SelectionPolicy<B> {
    fn select(&mut self, base: &B, candidates: &[&Action]) -> Option<usize>;
}

impl<B, F> SelectionPolicy<B> for F
where
    F: FnMut(&B, &[&Action]) -> Option<usize>,
{
    fn select(&mut self, base: &B, candidates: &[&Action]) -> Option<usize> {
        self(base, candidates)
    }
}

/// Always runs the first candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCandidate;

impl<B> SelectionPolicy<B> for FirstCandidate {
    fn select(&mut self, _base: &B, candidates: &[&Action]) -> Option<usize> {
        (!candidates.is_empty()).then_some(0)
    }
}

/// Runs the most preferred candidate by name, falling back to the first one.
#[derive(Debug, Clone, Default)]
pub struct PreferAction {
    preferred: Vec<String>,
}

impl PreferAction {
    /// `preferred` is ordered from most to least preferred.
    pub fn new<I, S>(preferred: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preferred: preferred.into_iter().map(Into::into).collect(),
        }
    }
}

impl<B> SelectionPolicy<B> for PreferAction {
    fn select(&mut self, _base: &B, candidates: &[&Action]) -> Option<usize> {
        self.preferred
            .iter()
            .find_map(|name| candidates.iter().position(|candidate| candidate.name() == name))
            .or_else(|| (!candidates.is_empty()).then_some(0))
    }
}

#[cfg(test)]
mod tests {
    use crate::action::Outputs;

    use super::*;

    fn action(name: &str) -> Action {
        Action::builder(name).body(|_| Ok(Outputs::none())).build().unwrap()
    }

    #[test]
    fn first_candidate_needs_a_candidate() {
        let only = action("only");
        assert_eq!(SelectionPolicy::<()>::select(&mut FirstCandidate, &(), &[&only]), Some(0));
        assert_eq!(SelectionPolicy::<()>::select(&mut FirstCandidate, &(), &[]), None);
    }

    #[test]
    fn preferred_names_win_in_order() {
        let (browse, summarize, finish) = (action("browse"), action("summarize"), action("finish"));
        let mut policy = PreferAction::new(["finish", "summarize"]);

        assert_eq!(SelectionPolicy::<()>::select(&mut policy, &(), &[&browse, &summarize, &finish]), Some(2));
        assert_eq!(SelectionPolicy::<()>::select(&mut policy, &(), &[&browse, &summarize]), Some(1));
        assert_eq!(SelectionPolicy::<()>::select(&mut policy, &(), &[&browse]), Some(0));
    }

    #[test]
    fn closures_are_policies() {
        let (a, b) = (action("a"), action("b"));
        let mut last = |_: &(), candidates: &[&Action]| candidates.len().checked_sub(1);
        assert_eq!(SelectionPolicy::<()>::select(&mut last, &(), &[&a, &b]), Some(1));
    }
}
