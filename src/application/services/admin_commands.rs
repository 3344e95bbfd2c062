//! Administrative chat commands: plugin switches, cooldowns and permission rules

use crate::application::errors::{CommandError, ManageError};
use crate::domain::entities::{
    Command, Effect, GroupRole, Message, PermissionLevel, PermissionRule, PluginKey, RuleTarget, Scope,
    Subject,
};

use super::command_service::{CommandService, NameIndex};
use super::manager::{ManagerService, SharedManager};
use super::registry::PluginRegistry;

const GROUP_ONLY: &str = "Use this command in a group.";
const GLOBAL_SUPERUSER_ONLY: &str = "Global scope needs a super-user.";

/// Register every admin command on `commands`
pub fn register_admin_commands(commands: &mut CommandService, manager: SharedManager) {
    let names = commands.name_index();

    for enabled in [true, false] {
        let (name, alias, verb) = if enabled { ("enable", "启用", "Enable") } else { ("disable", "禁用", "Disable") };

        let shared = manager.clone();
        commands.register(Command::new(name)
            .with_alias(alias)
            .attached()
            .with_description(format!("{} a plugin or plugin:feature", verb))
            .with_usage(format!("{} <plugin[:feature]> [global]", name))
            .with_permission(PermissionLevel::SuperUser)
            .with_handler(move |msg| {
                let (args, global) = split_scope(msg.content.args());
                let Some(key) = args.first() else {
                    return Ok(format!("Usage: {} <plugin[:feature]> [global]", name));
                };
                let key = PluginKey::parse(key);
                with_manager(&shared, |m| {
                    let scope = match target_scope(m, &msg, global) {
                        Ok(scope) => scope,
                        Err(reply) => return Ok(reply),
                    };
                    Ok(match m.commit(|m| m.registry_mut().set_key(&key, &scope, enabled))? {
                        Ok(()) => format!("{}d {} in {}", verb, key, scope),
                        Err(e) => not_found(e),
                    })
                })
            }));

        let shared = manager.clone();
        let (name, alias) = if enabled { ("enable-all", "启用all") } else { ("disable-all", "禁用all") };
        commands.register(Command::new(name)
            .with_alias(alias)
            .with_description(format!("{} every plugin", verb))
            .with_usage(format!("{} [global]", name))
            .with_permission(PermissionLevel::SuperUser)
            .with_handler(move |msg| {
                let (_, global) = split_scope(msg.content.args());
                with_manager(&shared, |m| {
                    let scope = match target_scope(m, &msg, global) {
                        Ok(scope) => scope,
                        Err(reply) => return Ok(reply),
                    };
                    if m.registry().is_empty() {
                        return Ok("No plugins registered.".to_string());
                    }
                    let count = m.apply(|m| m.registry_mut().set_all(&scope, enabled))?;
                    tracing::info!("{}d {} plugins in {}", verb, count, scope);
                    Ok(format!("{}d {} plugins in {}", verb, count, scope))
                })
            }));

        let shared = manager.clone();
        let (name, alias) = if enabled { ("enable-feature", "启用功能") } else { ("disable-feature", "禁用功能") };
        commands.register(Command::new(name)
            .with_alias(alias)
            .with_description(format!("{} one feature of a plugin", verb))
            .with_usage(format!("{} <plugin> <feature> [global]", name))
            .with_permission(PermissionLevel::SuperUser)
            .with_handler(move |msg| {
                let (args, global) = split_scope(msg.content.args());
                let [plugin, feature] = args.as_slice() else {
                    return Ok(format!("Usage: {} <plugin> <feature> [global]", name));
                };
                let key = PluginKey::feature(*plugin, *feature);
                with_manager(&shared, |m| {
                    let scope = match target_scope(m, &msg, global) {
                        Ok(scope) => scope,
                        Err(reply) => return Ok(reply),
                    };
                    Ok(match m.commit(|m| m.registry_mut().set_key(&key, &scope, enabled))? {
                        Ok(()) => format!("{}d feature {} in {}", verb, key, scope),
                        Err(e) => not_found(e),
                    })
                })
            }));
    }

    let shared = manager.clone();
    commands.register(Command::new("reset")
        .with_description("Drop a switch so the plugin inherits its default")
        .with_usage("reset <plugin[:feature]> [global]")
        .with_permission(PermissionLevel::SuperUser)
        .with_handler(move |msg| {
            let (args, global) = split_scope(msg.content.args());
            let Some(key) = args.first() else {
                return Ok("Usage: reset <plugin[:feature]> [global]".to_string());
            };
            let key = PluginKey::parse(key);
            with_manager(&shared, |m| {
                let scope = match target_scope(m, &msg, global) {
                    Ok(scope) => scope,
                    Err(reply) => return Ok(reply),
                };
                Ok(match m.commit(|m| m.registry_mut().clear(&key, &scope))? {
                    Ok(true) => format!("Reset {} in {}", key, scope),
                    Ok(false) => format!("{} has no switch in {}", key, scope),
                    Err(e) => not_found(e),
                })
            })
        }));

    let shared = manager.clone();
    commands.register(Command::new("plugins")
        .with_alias("插件开关状态")
        .with_description("List plugin switches")
        .with_usage("plugins [global]")
        .with_permission(PermissionLevel::GroupAdmin)
        .with_handler(move |msg| {
            let (_, global) = split_scope(msg.content.args());
            let scope = view_scope(&msg, global);
            with_manager(&shared, |m| Ok(render_statuses(m.registry(), &scope)))
        }));

    register_cooldown_commands(commands, &manager);
    register_rule_commands(commands, &manager, names);
}

fn register_cooldown_commands(commands: &mut CommandService, manager: &SharedManager) {
    let shared = manager.clone();
    commands.register(Command::new("cd")
        .with_alias("启用CD")
        .attached()
        .with_description("Set a cooldown in this group")
        .with_usage("cd <plugin[:feature]> <seconds>")
        .with_permission(PermissionLevel::SuperUser)
        .with_handler(move |msg| {
            let args = msg.content.args();
            let [key, seconds] = args else {
                return Ok("Usage: cd <plugin[:feature]> <seconds>".to_string());
            };
            set_cooldown(&shared, &msg, PluginKey::parse(key), Some(seconds))
        }));

    let shared = manager.clone();
    commands.register(Command::new("cd-off")
        .with_alias("禁用CD")
        .attached()
        .with_description("Remove a cooldown in this group")
        .with_usage("cd-off <plugin[:feature]>")
        .with_permission(PermissionLevel::SuperUser)
        .with_handler(move |msg| {
            let args = msg.content.args();
            let [key] = args else {
                return Ok("Usage: cd-off <plugin[:feature]>".to_string());
            };
            set_cooldown(&shared, &msg, PluginKey::parse(key), None)
        }));

    let shared = manager.clone();
    commands.register(Command::new("feature-cd")
        .with_alias("启用功能CD")
        .with_description("Set a feature cooldown in this group")
        .with_usage("feature-cd <plugin> <feature> <seconds>")
        .with_permission(PermissionLevel::SuperUser)
        .with_handler(move |msg| {
            let args = msg.content.args();
            let [plugin, feature, seconds] = args else {
                return Ok("Usage: feature-cd <plugin> <feature> <seconds>".to_string());
            };
            set_cooldown(&shared, &msg, PluginKey::feature(plugin.clone(), feature.clone()), Some(seconds))
        }));

    let shared = manager.clone();
    commands.register(Command::new("feature-cd-off")
        .with_alias("禁用功能CD")
        .with_description("Remove a feature cooldown in this group")
        .with_usage("feature-cd-off <plugin> <feature>")
        .with_permission(PermissionLevel::SuperUser)
        .with_handler(move |msg| {
            let args = msg.content.args();
            let [plugin, feature] = args else {
                return Ok("Usage: feature-cd-off <plugin> <feature>".to_string());
            };
            set_cooldown(&shared, &msg, PluginKey::feature(plugin.clone(), feature.clone()), None)
        }));

    let shared = manager.clone();
    commands.register(Command::new("cd-list")
        .with_alias("CD列表")
        .with_description("List cooldowns in this group")
        .with_permission(PermissionLevel::GroupAdmin)
        .with_handler(move |msg| {
            let Some(group) = msg.group_id.as_deref() else {
                return Ok(GROUP_ONLY.to_string());
            };
            with_manager(&shared, |m| Ok(render_cooldowns(m, group)))
        }));
}

fn register_rule_commands(commands: &mut CommandService, manager: &SharedManager, names: NameIndex) {
    for effect in [Effect::Allow, Effect::Deny] {
        let shared = manager.clone();
        let names = names.clone();
        let name = effect.as_str();
        commands.register(Command::new(name)
            .with_description(format!("{} a command or plugin for a user, role or group", name))
            .with_usage(format!("{} <command|plugin:name> <user:id[@global]|role:r[@global]|group[:id]>", name))
            .with_permission(PermissionLevel::SuperUser)
            .with_handler(move |msg| {
                let args = msg.content.args();
                let [target, subject] = args else {
                    return Ok(format!("Usage: {} <command|plugin:name> <subject>", name));
                };
                with_manager(&shared, |m| {
                    let parsed = parse_subject(subject, msg.group_id.as_deref())
                        .and_then(|s| Ok((s, parse_target(target, &names, m.registry())?)));
                    let (subject, target) = match parsed {
                        Ok(parsed) => parsed,
                        Err(e) => return Ok(not_found(e)),
                    };
                    let rule = PermissionRule::new(subject, target, effect);
                    let line = rule.to_string();
                    m.apply(|m| m.gate_mut().set_rule(rule))?;
                    Ok(format!("Rule saved: {}", line))
                })
            }));
    }

    let shared = manager.clone();
    let index = names.clone();
    commands.register(Command::new("revoke")
        .with_description("Remove a permission rule")
        .with_usage("revoke <command|plugin:name> <subject>")
        .with_permission(PermissionLevel::SuperUser)
        .with_handler(move |msg| {
            let args = msg.content.args();
            let [target, subject] = args else {
                return Ok("Usage: revoke <command|plugin:name> <subject>".to_string());
            };
            with_manager(&shared, |m| {
                let parsed = parse_subject(subject, msg.group_id.as_deref())
                    .and_then(|s| Ok((s, parse_target(target, &index, m.registry())?)));
                let (subject, target) = match parsed {
                    Ok(parsed) => parsed,
                    Err(e) => return Ok(not_found(e)),
                };
                Ok(match m.commit(|m| m.gate_mut().revoke(&subject, &target))? {
                    Ok(_) => format!("Rule removed: {} for {}", target, subject),
                    Err(e) => not_found(e),
                })
            })
        }));

    let shared = manager.clone();
    commands.register(Command::new("rules")
        .with_description("List permission rules for this group")
        .with_permission(PermissionLevel::GroupAdmin)
        .with_handler(move |msg| {
            with_manager(&shared, |m| {
                let rules = match msg.group_id.as_deref() {
                    Some(group) => m.gate().rules_for(group),
                    None => m.gate().rules(),
                };
                if rules.is_empty() {
                    return Ok("No permission rules.".to_string());
                }
                let lines: Vec<String> = rules.iter().map(|r| format!("- {}", r)).collect();
                Ok(format!("Permission rules:\n{}", lines.join("\n")))
            })
        }));
}

fn with_manager<F>(shared: &SharedManager, f: F) -> Result<String, CommandError>
where
    F: FnOnce(&mut ManagerService) -> Result<String, CommandError>,
{
    let mut guard = shared
        .write()
        .map_err(|_| CommandError::ExecutionFailed("Lock poisoned".to_string()))?;
    f(&mut guard)
}

fn set_cooldown(shared: &SharedManager, msg: &Message, key: PluginKey, seconds: Option<&String>) -> Result<String, CommandError> {
    let Some(group) = msg.group_id.as_deref() else {
        return Ok(GROUP_ONLY.to_string());
    };

    let seconds = match seconds.map(|s| s.parse::<u64>()) {
        None => 0,
        Some(Ok(n)) if n > 0 => n,
        Some(_) => return Ok("Cooldown must be a positive whole number of seconds.".to_string()),
    };

    with_manager(shared, |m| {
        if let Err(e) = m.registry().validate(&key) {
            return Ok(not_found(e));
        }
        let previous = m.apply(|m| m.cooldowns_mut().set(&key, group, seconds))?;
        Ok(match (seconds, previous) {
            (0, 0) => format!("{} had no cooldown in this group", key),
            (0, _) => format!("Removed the cooldown of {} in this group", key),
            (n, _) => format!("Cooldown of {} in this group: {}s", key, n),
        })
    })
}

fn not_found(e: ManageError) -> String {
    match e {
        ManageError::InvalidArgs(msg) => format!("Invalid arguments: {}", msg),
        other => format!("Not found, nothing changed ({})", other),
    }
}

/// Split off a trailing `global` / `全局` word
fn split_scope(args: &[String]) -> (Vec<&str>, bool) {
    let mut args: Vec<&str> = args.iter().map(String::as_str).collect();
    let global = matches!(args.last(), Some(&"global") | Some(&"全局"));
    if global {
        args.pop();
    }
    (args, global)
}

/// Scope for a mutation: the sender's group, or global for super-users who ask for it
fn target_scope(manager: &ManagerService, msg: &Message, global: bool) -> Result<Scope, String> {
    if global {
        return if manager.is_superuser(msg.sender_id()) {
            Ok(Scope::Global)
        } else {
            Err(GLOBAL_SUPERUSER_ONLY.to_string())
        };
    }
    msg.group_id
        .as_deref()
        .map(Scope::group)
        .ok_or_else(|| GROUP_ONLY.to_string())
}

/// Scope for a listing: private chats see the global state
fn view_scope(msg: &Message, global: bool) -> Scope {
    match (&msg.group_id, global) {
        (Some(group), false) => Scope::group(group.clone()),
        _ => Scope::Global,
    }
}

/// Parse `user:<id>[@global]`, `role:<role>[@global]`, `group` or `group:<id>`.
/// User and role subjects are scoped to `current_group` unless marked global.
pub fn parse_subject(token: &str, current_group: Option<&str>) -> Result<Subject, ManageError> {
    let (body, global) = match token.strip_suffix("@global") {
        Some(body) => (body, true),
        None => (token, false),
    };
    let scope_group = if global { None } else { current_group };

    match body.split_once(':') {
        Some(("user", id)) if !id.is_empty() => Ok(Subject::user(id, scope_group)),
        Some(("role", role)) => GroupRole::parse(role)
            .map(|r| Subject::role(r, scope_group))
            .ok_or_else(|| ManageError::InvalidArgs(format!("unknown role '{}'", role))),
        Some(("group", id)) if !id.is_empty() => Ok(Subject::group(id)),
        None if body == "group" => current_group
            .map(Subject::group)
            .ok_or_else(|| ManageError::InvalidArgs("'group' needs a group chat or group:<id>".to_string())),
        _ => Err(ManageError::InvalidArgs(format!("bad subject '{}'", token))),
    }
}

/// Parse `plugin:<name>`, `command:<name>` or a bare name (command first)
pub fn parse_target(token: &str, names: &NameIndex, registry: &PluginRegistry) -> Result<RuleTarget, ManageError> {
    match token.split_once(':') {
        Some(("plugin", plugin)) => {
            if registry.contains(plugin) {
                Ok(RuleTarget::Plugin(plugin.to_string()))
            } else {
                Err(ManageError::UnknownPlugin(plugin.to_string()))
            }
        }
        Some(("command", command)) => names
            .canonical(command)
            .map(RuleTarget::Command)
            .ok_or_else(|| ManageError::UnknownTarget(command.to_string())),
        _ => names
            .canonical(token)
            .map(RuleTarget::Command)
            .or_else(|| registry.contains(token).then(|| RuleTarget::Plugin(token.to_string())))
            .ok_or_else(|| ManageError::UnknownTarget(token.to_string())),
    }
}

fn render_statuses(registry: &PluginRegistry, scope: &Scope) -> String {
    let statuses = registry.statuses(scope);
    if statuses.is_empty() {
        return "No plugins registered.".to_string();
    }

    let mut lines = vec![format!("Plugin switches ({}):", scope)];
    for status in statuses {
        let indent = if status.key.is_feature() { "    " } else { "" };
        lines.push(format!(
            "{}{} ({}) - {}",
            indent,
            status.label,
            status.key,
            if status.enabled { "ON" } else { "OFF" }
        ));
    }
    lines.join("\n")
}

fn render_cooldowns(manager: &ManagerService, group: &str) -> String {
    let registry = manager.registry();
    if registry.is_empty() {
        return "No plugins registered.".to_string();
    }

    let cooldowns = manager.cooldowns();
    let mut lines = vec![format!("Cooldowns in group {}:", group)];
    for descriptor in registry.descriptors() {
        let keys = std::iter::once(PluginKey::plugin(descriptor.name.clone())).chain(
            descriptor
                .features
                .iter()
                .map(|f| PluginKey::feature(descriptor.name.clone(), f.clone())),
        );
        for key in keys {
            let seconds = cooldowns.duration(&key, group);
            let value = if seconds > 0 { format!("{}s", seconds) } else { "none".to_string() };
            lines.push(format!("{} ({}) - {}", descriptor.label(), key, value));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PluginDescriptor;

    #[test]
    fn test_parse_subject() {
        assert_eq!(parse_subject("user:42", Some("100")).unwrap(), Subject::user("42", Some("100")));
        assert_eq!(parse_subject("user:42@global", Some("100")).unwrap(), Subject::user("42", None));
        assert_eq!(parse_subject("user:42", None).unwrap(), Subject::user("42", None));
        assert_eq!(parse_subject("role:admin", Some("100")).unwrap(), Subject::role(GroupRole::Admin, Some("100")));
        assert_eq!(parse_subject("group", Some("100")).unwrap(), Subject::group("100"));
        assert_eq!(parse_subject("group:200", None).unwrap(), Subject::group("200"));

        assert!(parse_subject("group", None).is_err());
        assert!(parse_subject("role:king", Some("100")).is_err());
        assert!(parse_subject("someone", Some("100")).is_err());
    }

    #[test]
    fn test_parse_target() {
        let mut commands = CommandService::new("/");
        commands.register(Command::new("draw").with_alias("抽签"));
        let names = commands.name_index();

        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::new("draw_lots"));
        registry.register(PluginDescriptor::new("jrrp"));

        assert_eq!(parse_target("抽签", &names, &registry).unwrap(), RuleTarget::Command("draw".to_string()));
        assert_eq!(parse_target("jrrp", &names, &registry).unwrap(), RuleTarget::Plugin("jrrp".to_string()));
        assert_eq!(
            parse_target("plugin:draw_lots", &names, &registry).unwrap(),
            RuleTarget::Plugin("draw_lots".to_string())
        );
        assert_eq!(
            parse_target("command:nope", &names, &registry),
            Err(ManageError::UnknownTarget("nope".to_string()))
        );
        assert_eq!(
            parse_target("plugin:nope", &names, &registry),
            Err(ManageError::UnknownPlugin("nope".to_string()))
        );
    }

    #[test]
    fn test_split_scope() {
        let args = vec!["jrrp".to_string(), "global".to_string()];
        assert_eq!(split_scope(&args), (vec!["jrrp"], true));
        let args = vec!["jrrp".to_string()];
        assert_eq!(split_scope(&args), (vec!["jrrp"], false));
    }
}
