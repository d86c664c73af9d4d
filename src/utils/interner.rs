//! Global String Interner
//!
//! Parameter, part and drawable ids arrive as strings from settings and
//! motion documents but are compared and hashed every frame. They are interned
//! once into compact [`Symbol`]s.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

/// Global interner instance.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Symbol type alias
///
/// A compact integer identifier that compares and hashes in O(1).
pub type Symbol = Spur;

/// Interns a string, returning its Symbol.
///
/// Returns the existing Symbol when the string is already interned.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Looks up the Symbol of an already interned string without allocating.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a Symbol back to its string.
///
/// # Panics
/// Panics if the Symbol did not come from this interner.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Pre-interns the standard parameter ids used by the compositor.
///
/// Called by [`SceneManager::new`](crate::scene::SceneManager::new) so the
/// per-frame hot path never touches the interner's write lock.
pub fn preload_standard_ids() {
    let common = [
        "ParamAngleX",
        "ParamAngleY",
        "ParamAngleZ",
        "ParamEyeBallX",
        "ParamEyeBallY",
        "ParamBodyAngleX",
        "ParamBreath",
        "ParamEyeLOpen",
        "ParamEyeROpen",
        "ParamMouthOpenY",
    ];

    for name in common {
        intern(name);
    }
}
