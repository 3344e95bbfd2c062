//! Permission gate - resolves allow/deny for a sender and a command

use std::collections::{BTreeMap, HashSet};

use crate::application::errors::ManageError;
use crate::domain::entities::{Effect, GroupRole, PermissionLevel, PermissionRule, RuleTarget, Subject};

/// Everything the gate needs to know about one invocation
#[derive(Debug, Clone)]
pub struct AccessRequest<'a> {
    pub user_id: &'a str,
    pub group_id: Option<&'a str>,
    pub role: GroupRole,
    pub command: &'a str,
    pub plugin: Option<&'a str>,
    pub required: PermissionLevel,
}

impl<'a> AccessRequest<'a> {
    pub fn new(user_id: &'a str, group_id: Option<&'a str>, command: &'a str) -> Self {
        Self {
            user_id,
            group_id,
            role: GroupRole::Member,
            command,
            plugin: None,
            required: PermissionLevel::Everyone,
        }
    }

    pub fn with_role(mut self, role: GroupRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_plugin(mut self, plugin: Option<&'a str>) -> Self {
        self.plugin = plugin;
        self
    }

    pub fn with_required(mut self, level: PermissionLevel) -> Self {
        self.required = level;
        self
    }
}

/// Holds permission rules and the super-user list.
///
/// Resolution order: super-users are always allowed; otherwise the first
/// matching rule wins, from user-in-group, user-everywhere, role-in-group,
/// role-everywhere to group rules, with command rules ahead of plugin rules
/// inside each tier. Without a rule the command's required level decides.
#[derive(Debug, Default)]
pub struct PermissionGate {
    rules: BTreeMap<(Subject, RuleTarget), Effect>,
    superusers: HashSet<String>,
}

impl PermissionGate {
    pub fn new<I, S>(superusers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: BTreeMap::new(),
            superusers: superusers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_superuser(&self, user_id: &str) -> bool {
        self.superusers.contains(user_id)
    }

    /// Plain lookup with member role and no plugin or level requirements
    pub fn check(&self, user_id: &str, group_id: Option<&str>, command: &str) -> Effect {
        self.evaluate(&AccessRequest::new(user_id, group_id, command))
    }

    pub fn evaluate(&self, request: &AccessRequest<'_>) -> Effect {
        if self.is_superuser(request.user_id) {
            return Effect::Allow;
        }

        if let Some(rule) = self.matching_rule(request) {
            tracing::debug!("Rule matched for {} on {}: {}", request.user_id, request.command, rule);
            return rule.effect;
        }

        if request.required.admits(request.role, false) {
            Effect::Allow
        } else {
            Effect::Deny
        }
    }

    /// The rule that decides `request`, if any
    pub fn matching_rule(&self, request: &AccessRequest<'_>) -> Option<PermissionRule> {
        let mut targets = vec![RuleTarget::Command(request.command.to_string())];
        if let Some(plugin) = request.plugin {
            targets.push(RuleTarget::Plugin(plugin.to_string()));
        }

        for subject in Self::tiers(request) {
            for target in &targets {
                if let Some(&effect) = self.rules.get(&(subject.clone(), target.clone())) {
                    return Some(PermissionRule::new(subject, target.clone(), effect));
                }
            }
        }
        None
    }

    fn tiers(request: &AccessRequest<'_>) -> Vec<Subject> {
        let mut tiers = Vec::with_capacity(5);
        if let Some(group) = request.group_id {
            tiers.push(Subject::user(request.user_id, Some(group)));
        }
        tiers.push(Subject::user(request.user_id, None));
        if let Some(group) = request.group_id {
            tiers.push(Subject::role(request.role, Some(group)));
        }
        tiers.push(Subject::role(request.role, None));
        if let Some(group) = request.group_id {
            tiers.push(Subject::group(group));
        }
        tiers
    }

    /// Insert or replace the rule for its (subject, target) pair.
    /// Returns the effect it replaced.
    pub fn set_rule(&mut self, rule: PermissionRule) -> Option<Effect> {
        tracing::info!("Permission rule set: {}", rule);
        self.rules.insert((rule.subject, rule.target), rule.effect)
    }

    pub fn grant(&mut self, subject: Subject, target: RuleTarget) -> Option<Effect> {
        self.set_rule(PermissionRule::new(subject, target, Effect::Allow))
    }

    pub fn deny(&mut self, subject: Subject, target: RuleTarget) -> Option<Effect> {
        self.set_rule(PermissionRule::new(subject, target, Effect::Deny))
    }

    pub fn revoke(&mut self, subject: &Subject, target: &RuleTarget) -> Result<Effect, ManageError> {
        self.rules
            .remove(&(subject.clone(), target.clone()))
            .ok_or_else(|| ManageError::RuleNotFound(format!("{} for {}", target, subject)))
    }

    pub fn rules(&self) -> Vec<PermissionRule> {
        self.rules
            .iter()
            .map(|((subject, target), &effect)| PermissionRule::new(subject.clone(), target.clone(), effect))
            .collect()
    }

    /// Rules that can affect members of `group_id`
    pub fn rules_for(&self, group_id: &str) -> Vec<PermissionRule> {
        self.rules()
            .into_iter()
            .filter(|r| r.subject.concerns_group(group_id))
            .collect()
    }

    pub fn restore(&mut self, rules: Vec<PermissionRule>) {
        self.rules = rules
            .into_iter()
            .map(|r| ((r.subject, r.target), r.effect))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const U: &str = "10001";
    const G: &str = "20001";

    fn draw() -> RuleTarget {
        RuleTarget::Command("draw".to_string())
    }

    #[test]
    fn test_default_allow() {
        let gate = PermissionGate::new(Vec::<String>::new());
        assert_eq!(gate.check(U, Some(G), "draw"), Effect::Allow);
        assert_eq!(gate.check(U, None, "draw"), Effect::Allow);
    }

    #[test]
    fn test_user_deny_beats_group_default() {
        let mut gate = PermissionGate::new(Vec::<String>::new());
        gate.grant(Subject::group(G), draw());
        gate.deny(Subject::user(U, Some(G)), draw());

        assert_eq!(gate.check(U, Some(G), "draw"), Effect::Deny);
        assert_eq!(gate.check("10002", Some(G), "draw"), Effect::Allow);
        // the user rule is scoped to G
        assert_eq!(gate.check(U, Some("20002"), "draw"), Effect::Allow);
    }

    #[test]
    fn test_user_rule_overrides_group_rule_both_ways() {
        for (user_effect, group_effect) in [
            (Effect::Allow, Effect::Deny),
            (Effect::Deny, Effect::Allow),
            (Effect::Allow, Effect::Allow),
            (Effect::Deny, Effect::Deny),
        ] {
            for user_group in [Some(G), None] {
                let mut gate = PermissionGate::new(Vec::<String>::new());
                gate.set_rule(PermissionRule::new(Subject::group(G), draw(), group_effect));
                gate.set_rule(PermissionRule::new(Subject::user(U, user_group), draw(), user_effect));
                assert_eq!(gate.check(U, Some(G), "draw"), user_effect);
            }
        }
    }

    #[test]
    fn test_group_scoped_user_rule_beats_global_user_rule() {
        let mut gate = PermissionGate::new(Vec::<String>::new());
        gate.deny(Subject::user(U, None), draw());
        gate.grant(Subject::user(U, Some(G)), draw());
        assert_eq!(gate.check(U, Some(G), "draw"), Effect::Allow);
        assert_eq!(gate.check(U, Some("20002"), "draw"), Effect::Deny);
        assert_eq!(gate.check(U, None, "draw"), Effect::Deny);
    }

    #[test]
    fn test_command_rule_beats_plugin_rule_in_same_tier() {
        let mut gate = PermissionGate::new(Vec::<String>::new());
        gate.deny(Subject::group(G), RuleTarget::Plugin("draw_lots".to_string()));
        gate.grant(Subject::group(G), draw());

        let request = AccessRequest::new(U, Some(G), "draw").with_plugin(Some("draw_lots"));
        assert_eq!(gate.evaluate(&request), Effect::Allow);

        let request = AccessRequest::new(U, Some(G), "reroll").with_plugin(Some("draw_lots"));
        assert_eq!(gate.evaluate(&request), Effect::Deny);
    }

    #[test]
    fn test_role_rules_and_required_level() {
        let mut gate = PermissionGate::new(Vec::<String>::new());
        let request = AccessRequest::new(U, Some(G), "plugins").with_required(PermissionLevel::GroupAdmin);
        assert_eq!(gate.evaluate(&request), Effect::Deny);
        assert_eq!(gate.evaluate(&request.clone().with_role(GroupRole::Admin)), Effect::Allow);

        gate.grant(Subject::role(GroupRole::Member, Some(G)), RuleTarget::Command("plugins".to_string()));
        assert_eq!(gate.evaluate(&request), Effect::Allow);
    }

    #[test]
    fn test_superuser_bypasses_rules() {
        let mut gate = PermissionGate::new(vec![U]);
        gate.deny(Subject::user(U, Some(G)), draw());
        assert_eq!(gate.check(U, Some(G), "draw"), Effect::Allow);

        let request = AccessRequest::new(U, Some(G), "enable").with_required(PermissionLevel::SuperUser);
        assert_eq!(gate.evaluate(&request), Effect::Allow);
    }

    #[test]
    fn test_revoke_and_replace() {
        let mut gate = PermissionGate::new(Vec::<String>::new());
        assert_eq!(gate.deny(Subject::group(G), draw()), None);
        assert_eq!(gate.grant(Subject::group(G), draw()), Some(Effect::Deny));
        assert_eq!(gate.rules().len(), 1);

        assert_eq!(gate.revoke(&Subject::group(G), &draw()), Ok(Effect::Allow));
        assert!(matches!(
            gate.revoke(&Subject::group(G), &draw()),
            Err(ManageError::RuleNotFound(_))
        ));
    }

    #[test]
    fn test_rules_for_group() {
        let mut gate = PermissionGate::new(Vec::<String>::new());
        gate.deny(Subject::group(G), draw());
        gate.deny(Subject::group("20002"), draw());
        gate.deny(Subject::user(U, None), draw());
        assert_eq!(gate.rules_for(G).len(), 2);
    }
}
