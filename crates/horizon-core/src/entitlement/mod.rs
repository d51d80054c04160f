//! Entitlement gate: the pure create/regenerate authorization decision.
//!
//! Callers fetch the tier and the existing-roadmap flag from the store
//! immediately before calling [`authorize`]; the gate itself performs no I/O.

use std::fmt;

use horizon_db::models::EntitlementTier;

/// Reason string for a refused create on an answer set that already has a
/// roadmap.
pub const REASON_ALREADY_GENERATED: &str = "already generated";
/// Reason string for a refused regenerate on the free tier.
pub const REASON_PAID_FEATURE: &str = "paid feature";

/// The gated roadmap operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateAction {
    /// First generation for an answer set.
    Create,
    /// Replace the current roadmap with a fresh generation (pro only).
    Regenerate,
}

impl fmt::Display for GenerateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Regenerate => "regenerate",
        };
        f.write_str(s)
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: &'static str },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide whether a create/regenerate request is permitted.
///
/// Create is a one-shot operation per answer set: it is denied whenever a
/// roadmap already exists, regardless of tier. Regenerate is denied unless
/// the tier is pro.
pub fn authorize(
    action: GenerateAction,
    tier: EntitlementTier,
    has_existing_roadmap: bool,
) -> Decision {
    match action {
        GenerateAction::Create if has_existing_roadmap => Decision::Deny {
            reason: REASON_ALREADY_GENERATED,
        },
        GenerateAction::Regenerate if tier != EntitlementTier::Pro => Decision::Deny {
            reason: REASON_PAID_FEATURE,
        },
        _ => Decision::Allow,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_db::models::EntitlementTier::{Free, Pro};

    #[test]
    fn create_with_existing_roadmap_always_denies() {
        for tier in [Free, Pro] {
            let decision = authorize(GenerateAction::Create, tier, true);
            assert_eq!(
                decision,
                Decision::Deny {
                    reason: REASON_ALREADY_GENERATED
                },
                "tier {tier} should not bypass the one-shot create rule"
            );
        }
    }

    #[test]
    fn create_without_existing_roadmap_allows_any_tier() {
        for tier in [Free, Pro] {
            assert!(authorize(GenerateAction::Create, tier, false).is_allowed());
        }
    }

    #[test]
    fn regenerate_on_free_always_denies() {
        for has_existing in [false, true] {
            let decision = authorize(GenerateAction::Regenerate, Free, has_existing);
            assert_eq!(
                decision,
                Decision::Deny {
                    reason: REASON_PAID_FEATURE
                }
            );
        }
    }

    #[test]
    fn regenerate_on_pro_with_existing_roadmap_allows() {
        assert!(authorize(GenerateAction::Regenerate, Pro, true).is_allowed());
    }

    #[test]
    fn action_display() {
        assert_eq!(GenerateAction::Create.to_string(), "create");
        assert_eq!(GenerateAction::Regenerate.to_string(), "regenerate");
    }
}
