use serde::{Deserialize, Serialize};

/// Admission level of a motion request.
///
/// Ordered `None < Idle < Normal < Force`. A request is admitted only when it
/// is strictly higher than whatever is playing or reserved, except `Force`,
/// which is always admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    None,
    Idle,
    Normal,
    Force,
}

impl Priority {
    /// Whether a request at `self` may take the motion slot while `current`
    /// is playing and `reserved` is held.
    #[inline]
    #[must_use]
    pub fn admits_over(self, current: Priority, reserved: Priority) -> bool {
        match self {
            Priority::Force => true,
            requested => requested > current && requested > reserved,
        }
    }
}
