//! Collective membership state kept on the user record.

use chrono::{DateTime, Utc};

use super::User;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MembershipType {
    Monthly,
    Yearly,
}

impl User {
    /// Records that the user's application to the Collective got approved.
    ///
    /// Approval alone doesn't make the user a member, paid membership is
    /// tracked separately with `is_collective_member`.
    pub fn approve_for_collective(&mut self, time: DateTime<Utc>) {
        self.collective_approved_at = Some(time);
    }

    /// Manual membership switch operated by admins.
    ///
    /// Granting stamps the approval time if it's missing, revoking clears
    /// it. Neither touches the billing side: revoking access doesn't cancel
    /// a running subscription.
    pub fn set_collective_access(&mut self, grant: bool, time: DateTime<Utc>) {
        self.is_collective_member = grant;
        if grant {
            if self.collective_approved_at.is_none() {
                self.collective_approved_at = Some(time);
            }
        } else {
            self.collective_approved_at = None;
        }
    }

    /// Mirrors the state of the membership subscription as reported by the
    /// payment processor.
    ///
    /// An active subscription for a user without an approval timestamp gets
    /// one stamped, so that membership always implies approval.
    pub fn apply_subscription(&mut self, active: bool, subscription_id: &str, time: DateTime<Utc>) {
        self.is_collective_member = active;
        self.collective_stripe_subscription_id = Some(subscription_id.to_string());
        if active && self.collective_approved_at.is_none() {
            self.collective_approved_at = Some(time);
        }
    }

    /// Membership is only valid with an approval timestamp present.
    pub fn membership_consistent(&self) -> bool {
        !self.is_collective_member || self.collective_approved_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_does_not_grant_membership() {
        let mut user = User::new("a@x.com", "Ada");
        user.approve_for_collective(Utc::now());
        assert!(user.collective_approved_at.is_some());
        assert!(!user.is_collective_member);
    }

    #[test]
    fn toggle_keeps_existing_approval_time() {
        let mut user = User::new("a@x.com", "Ada");
        let approved = Utc::now() - chrono::Duration::days(3);
        user.approve_for_collective(approved);

        user.set_collective_access(true, Utc::now());
        assert!(user.is_collective_member);
        assert_eq!(user.collective_approved_at, Some(approved));
        assert!(user.membership_consistent());

        user.set_collective_access(false, Utc::now());
        assert!(!user.is_collective_member);
        assert!(user.collective_approved_at.is_none());
    }

    #[test]
    fn subscription_sets_membership_both_ways() {
        let mut user = User::new("a@x.com", "Ada");
        user.apply_subscription(true, "sub_1", Utc::now());
        assert!(user.is_collective_member);
        assert!(user.membership_consistent());
        assert_eq!(user.collective_stripe_subscription_id.as_deref(), Some("sub_1"));

        user.apply_subscription(false, "sub_1", Utc::now());
        assert!(!user.is_collective_member);
    }

    #[test]
    fn toggle_stamps_missing_approval() {
        let mut user = User::new("a@x.com", "Ada");
        user.set_collective_access(true, Utc::now());
        assert!(user.collective_approved_at.is_some());
        assert!(user.membership_consistent());
    }
}
