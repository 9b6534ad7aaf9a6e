use crate::profiles::Profile;

/// Decides whether a candidate may appear in a viewer's feed. Gender is an
/// opaque label at this level; policies compare values, nothing more.
pub trait MatchPolicy: Send + Sync {
    fn eligible(&self, viewer: &Profile, candidate: &Profile) -> bool;
}

/// Current product rule: only candidates whose gender differs from the
/// viewer's are shown.
#[derive(Debug, Clone, Copy, Default)]
pub struct OppositeGender;

impl MatchPolicy for OppositeGender {
    fn eligible(&self, viewer: &Profile, candidate: &Profile) -> bool {
        viewer.gender != candidate.gender
    }
}
