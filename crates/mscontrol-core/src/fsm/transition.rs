/// Ordered pair of states describing one legal move
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
}

impl<S> Transition<S> {
    pub fn new(from: S, to: S) -> Self {
        Self { from, to }
    }
}

impl<S> From<(S, S)> for Transition<S> {
    fn from((from, to): (S, S)) -> Self {
        Self { from, to }
    }
}
